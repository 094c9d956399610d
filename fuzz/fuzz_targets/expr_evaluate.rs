#![no_main]

// Harness: expr_evaluate
// Focus: evaluation is total and AND/OR agree with the per-atom verdicts.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use warden_core::access::{evaluate, CombinePolicy, Domain, EvaluationContext, Expression};

#[derive(Arbitrary, Debug)]
struct EvalFrame {
    raw: Vec<String>,
    user: String,
    primary_group: Option<String>,
    secondary_groups: Vec<String>,
    class: Option<String>,
    domain: u8,
}

fuzz_target!(|frame: EvalFrame| {
    let domain = match frame.domain % 3 {
        0 => Domain::Class,
        1 => Domain::Group,
        _ => Domain::User,
    };
    let ctx = EvaluationContext {
        user: frame.user,
        primary_group: frame.primary_group,
        secondary_groups: frame.secondary_groups.into_iter().collect(),
        class: frame.class,
    };

    let expr = Expression::compile(&frame.raw);
    let verdicts: Vec<bool> = expr
        .iter()
        .map(|atom| evaluate(CombinePolicy::And, domain, &Expression::compile([atom.raw()]), &ctx))
        .collect();

    assert_eq!(evaluate(CombinePolicy::And, domain, &expr, &ctx), verdicts.iter().all(|v| *v));
    assert_eq!(evaluate(CombinePolicy::Or, domain, &expr, &ctx), verdicts.iter().any(|v| *v));
});
