use mcptrust_model::{PolicyConfig, PolicyMode, RuleSeverity};
use serde::Serialize;
use serde_json::Value as Json;

use crate::error::PolicyError;
use crate::expr::{self, Expr};

struct CompiledRule {
    name: String,
    expr: Expr,
    failure_msg: String,
    severity: RuleSeverity,
}

/// A [`PolicyConfig`] whose rule expressions have all compiled successfully.
/// Compilation happens once; evaluation never re-parses an expression.
pub struct CompiledPolicy {
    name: String,
    mode: PolicyMode,
    rules: Vec<CompiledRule>,
}

/// One rule's outcome against a given input document. `controlRefs`/
/// `evidence`/`evidenceCommands` are deliberately absent here — they are
/// informational metadata and must not influence (or be influenced by) the
/// evaluation result (§4.5).
#[derive(Debug, Clone, Serialize)]
pub struct RuleOutcome {
    pub rule: String,
    pub passed: bool,
    pub severity: RuleSeverity,
    pub failure_msg: Option<String>,
}

/// The result of evaluating every rule in a policy against one input
/// document.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyResult {
    pub passed: bool,
    pub outcomes: Vec<RuleOutcome>,
}

impl CompiledPolicy {
    /// Compiles every rule's expression, failing closed on the first
    /// compile error (§4.5 — "reject on compile error").
    pub fn compile(config: &PolicyConfig) -> Result<Self, PolicyError> {
        let rules = config
            .rules
            .iter()
            .map(|rule| {
                expr::compile(&rule.expr)
                    .map(|expr| CompiledRule {
                        name: rule.name.clone(),
                        expr,
                        failure_msg: rule.failure_msg.clone(),
                        severity: rule.severity,
                    })
                    .map_err(|reason| PolicyError::Compile {
                        rule: rule.name.clone(),
                        reason,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: config.name.clone(),
            mode: config.mode,
            rules,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluates every rule against `input`. A rule's `expr` must evaluate
    /// truthy to pass. Overall `passed` follows the policy's mode: `warn`
    /// never fails the policy outright (violations are still reported);
    /// `strict` fails the policy if any `error`-severity rule fails —
    /// `warn`-severity rules never flip the overall result even in strict
    /// mode, they are always advisory.
    pub fn evaluate(&self, input: &Json) -> PolicyResult {
        let outcomes: Vec<RuleOutcome> = self
            .rules
            .iter()
            .map(|rule| {
                let passed = rule.expr.eval(input).truthy();
                RuleOutcome {
                    rule: rule.name.clone(),
                    passed,
                    severity: rule.severity,
                    failure_msg: (!passed).then(|| rule.failure_msg.clone()),
                }
            })
            .collect();

        let passed = match self.mode {
            PolicyMode::Warn => true,
            PolicyMode::Strict => !outcomes
                .iter()
                .any(|o| !o.passed && o.severity == RuleSeverity::Error),
        };

        PolicyResult { passed, outcomes }
    }
}
