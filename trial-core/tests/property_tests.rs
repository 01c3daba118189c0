//! Property tests over the deterministic analysis components.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array};
use proptest::prelude::*;
use trial_core::analyzers::effect::TreatmentEffectEstimator;
use trial_core::analyzers::hypothesis::HypothesisTester;
use trial_core::analyzers::identify::{
    OutcomeVariable, TreatmentVariable, ValueType, VariableIdentifier, VariableRoles,
};
use trial_core::dataset::{dataset_from_columns, CellValue, Dataset};

fn two_arm_dataset(control: &[f64], treated: &[f64]) -> (Dataset, VariableRoles) {
    let mut assignment = vec![0i64; control.len()];
    assignment.extend(vec![1i64; treated.len()]);
    let mut outcome = control.to_vec();
    outcome.extend_from_slice(treated);

    let dataset = dataset_from_columns(vec![
        (
            "treatment",
            Arc::new(Int64Array::from(assignment)) as ArrayRef,
        ),
        ("outcome", Arc::new(Float64Array::from(outcome)) as ArrayRef),
    ])
    .unwrap();

    // Fixed roles keep the properties independent of identification.
    let roles = VariableRoles {
        treatment: Some(TreatmentVariable {
            column: "treatment".into(),
            treatment_value: CellValue::Number(1.0),
            control_value: CellValue::Number(0.0),
        }),
        outcome: Some(OutcomeVariable {
            column: "outcome".into(),
            value_type: ValueType::Continuous,
        }),
        covariates: vec![],
        all_columns: vec!["treatment".into(), "outcome".into()],
    };
    (dataset, roles)
}

fn group() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1e3..1e3f64, 2..30)
}

proptest! {
    #[test]
    fn ate_equals_difference_of_group_means(control in group(), treated in group()) {
        let (dataset, roles) = two_arm_dataset(&control, &treated);
        let effect = TreatmentEffectEstimator::new()
            .estimate(&dataset, &roles)
            .unwrap();

        let control_mean = control.iter().sum::<f64>() / control.len() as f64;
        let treated_mean = treated.iter().sum::<f64>() / treated.len() as f64;
        prop_assert!((effect.control_mean - control_mean).abs() < 1e-9);
        prop_assert!((effect.treatment_mean - treated_mean).abs() < 1e-9);
        prop_assert!(
            (effect.average_treatment_effect - (treated_mean - control_mean)).abs() < 1e-9
        );
    }

    #[test]
    fn confidence_interval_brackets_the_estimate(control in group(), treated in group()) {
        let (dataset, roles) = two_arm_dataset(&control, &treated);
        let effect = TreatmentEffectEstimator::new()
            .estimate(&dataset, &roles)
            .unwrap();

        prop_assert!(effect.ate_standard_error >= 0.0);
        prop_assert!(effect.ate_ci_95.lower <= effect.average_treatment_effect);
        prop_assert!(effect.average_treatment_effect <= effect.ate_ci_95.upper);
    }

    #[test]
    fn p_values_are_probabilities(control in group(), treated in group()) {
        let (dataset, roles) = two_arm_dataset(&control, &treated);
        let tests = HypothesisTester::new(0.05).test(&dataset, &roles).unwrap();

        prop_assert!((0.0..=1.0).contains(&tests.t_test.p_value));
        prop_assert!((0.0..=1.0).contains(&tests.mann_whitney_u_test.p_value));
        prop_assert_eq!(tests.statistically_significant, tests.p_value < 0.05);
    }

    #[test]
    fn cohens_d_sign_matches_mean_difference(control in group(), treated in group()) {
        let (dataset, roles) = two_arm_dataset(&control, &treated);
        let tests = HypothesisTester::new(0.05).test(&dataset, &roles).unwrap();

        let control_mean = control.iter().sum::<f64>() / control.len() as f64;
        let treated_mean = treated.iter().sum::<f64>() / treated.len() as f64;
        if treated_mean > control_mean {
            prop_assert!(tests.effect_size.cohens_d >= 0.0);
        } else if treated_mean < control_mean {
            prop_assert!(tests.effect_size.cohens_d <= 0.0);
        }
    }

    #[test]
    fn identification_never_panics(
        indicator in prop::collection::vec(0i64..5, 1..40),
        values in prop::collection::vec(-1e6..1e6f64, 1..40),
        context in "[ -~]{0,80}",
    ) {
        let n = indicator.len().min(values.len());
        let dataset = dataset_from_columns(vec![
            (
                "group",
                Arc::new(Int64Array::from(indicator[..n].to_vec())) as ArrayRef,
            ),
            (
                "measurement",
                Arc::new(Float64Array::from(values[..n].to_vec())) as ArrayRef,
            ),
        ])
        .unwrap();

        let roles = VariableIdentifier::new().identify(&dataset, &context);
        if let Some(treatment) = &roles.treatment {
            prop_assert_ne!(
                treatment.treatment_value.key(),
                treatment.control_value.key()
            );
        }
    }
}
