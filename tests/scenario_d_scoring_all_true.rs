//! Spec §8 Scenario D — scoring with all six trust articles true.

use trust_protocol_core::trust::{self, TrustArticles, TrustLevel};

#[test]
fn all_true_yields_verified_with_the_bonus_applied() {
    let articles = TrustArticles {
        inspection_mandate: true,
        consent_architecture: true,
        ethical_override: true,
        continuous_validation: true,
        right_to_disconnect: true,
        moral_recognition: true,
    };

    let result = trust::score(&articles);

    assert_eq!(result.compliance_score, 1.050);
    assert_eq!(result.guilt_score, 0.000);
    assert_eq!(result.trust_level, TrustLevel::Verified);
}
