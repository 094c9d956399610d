//! Evaluation of compiled expressions against a principal.
//!
//! A single generic loop handles every domain/policy combination. The domain
//! only decides how one atom name is compared against the context; the policy
//! only decides how per-atom verdicts combine.

use super::context::EvaluationContext;
use super::expr::Expression;

/// How per-atom verdicts combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinePolicy {
    /// Every atom must hold. Empty expression is true.
    And,
    /// At least one atom must hold. Empty expression is false.
    Or,
}

/// Which identity facts of the context an expression talks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Class,
    Group,
    User,
}

/// Outcome of comparing one atom name against the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMatch {
    Matched,
    Unmatched,
    /// The context has no value for this domain, so nothing was compared.
    Absent,
}

/// Compares an atom name against the relevant field(s) of a context.
pub trait FieldMatcher {
    fn match_field(&self, ctx: &EvaluationContext, name: &str) -> FieldMatch;
}

impl FieldMatcher for Domain {
    fn match_field(&self, ctx: &EvaluationContext, name: &str) -> FieldMatch {
        let matched = match self {
            Domain::Class => match ctx.class.as_deref() {
                Some(class) => class == name,
                None => return FieldMatch::Absent,
            },
            Domain::Group => {
                ctx.primary_group.as_deref() == Some(name) || ctx.secondary_groups.contains(name)
            }
            Domain::User => ctx.user == name,
        };
        if matched {
            FieldMatch::Matched
        } else {
            FieldMatch::Unmatched
        }
    }
}

/// Evaluates `expr` for `domain` under `policy`. Never fails.
pub fn evaluate(policy: CombinePolicy, domain: Domain, expr: &Expression, ctx: &EvaluationContext) -> bool {
    evaluate_with(policy, &domain, expr, ctx)
}

/// Generic evaluation loop over any `FieldMatcher`.
pub fn evaluate_with<M: FieldMatcher + ?Sized>(
    policy: CombinePolicy,
    matcher: &M,
    expr: &Expression,
    ctx: &EvaluationContext,
) -> bool {
    for atom in expr {
        // A negated atom starts out satisfied; a match flips it once.
        let mut found = atom.negated();

        match matcher.match_field(ctx, atom.name()) {
            FieldMatch::Matched => found = !found,
            FieldMatch::Unmatched => {}
            FieldMatch::Absent => match policy {
                // No value can satisfy a plain requirement: fail the whole expression
                // now. A negated atom stays satisfied and evaluation continues.
                CombinePolicy::And if !found => return false,
                CombinePolicy::And => continue,
                // The atom's verdict is its post-negation value, no comparison made.
                CombinePolicy::Or if found => return true,
                CombinePolicy::Or => continue,
            },
        }

        match policy {
            CombinePolicy::And if !found => return false,
            CombinePolicy::Or if found => return true,
            _ => {}
        }
    }

    match policy {
        CombinePolicy::And => true,
        CombinePolicy::Or => false,
    }
}
