//! Access-control expressions (compile once, evaluate per request).

pub mod context;
pub mod eval;
pub mod expr;

pub use context::EvaluationContext;
pub use eval::{evaluate, evaluate_with, CombinePolicy, Domain, FieldMatch, FieldMatcher};
pub use expr::{Atom, Expression};

/// A configured rule: which facts it talks about, how atoms combine, and the
/// compiled atoms. Immutable once built and safe to share between sessions.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AccessRule {
    pub policy: CombinePolicy,
    pub domain: Domain,
    pub expression: Expression,
}

impl AccessRule {
    /// Compiles `raw` into a rule.
    pub fn compile<I, S>(policy: CombinePolicy, domain: Domain, raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { policy, domain, expression: Expression::compile(raw) }
    }

    /// `true` if the principal in `ctx` satisfies this rule.
    pub fn matches(&self, ctx: &EvaluationContext) -> bool {
        let verdict = evaluate(self.policy, self.domain, &self.expression, ctx);
        tracing::trace!(
            domain = ?self.domain,
            policy = ?self.policy,
            expression = %self.expression,
            user = %ctx.user,
            verdict,
            "evaluated access rule"
        );
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_matches_delegates_to_evaluate() {
        let rule = AccessRule::compile(CombinePolicy::Or, Domain::Group, ["ops,!guests"]);
        assert_eq!(rule.expression.len(), 2);

        let ops = EvaluationContext::new("alice").with_primary_group("ops");
        assert!(rule.matches(&ops));

        // Not in ops, but also not in guests, so the negated atom holds.
        let dev = EvaluationContext::new("bob").with_primary_group("dev");
        assert!(rule.matches(&dev));

        let guest = EvaluationContext::new("eve").with_primary_group("guests");
        assert!(!rule.matches(&guest));
    }

    #[test]
    fn test_rule_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AccessRule>();
        assert_send_sync::<EvaluationContext>();
    }
}
