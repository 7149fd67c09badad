//! Per-model request capabilities.
//!
//! Each model id resolves once to a [`ModelCapabilities`] descriptor through an
//! ordered rule table; adapters consult the descriptor instead of inspecting
//! model names themselves.

/// Which request field carries the output token cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxTokensField {
    MaxTokens,
    MaxCompletionTokens,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapabilities {
    /// temperature, top_p and the penalty fields may be sent.
    pub allows_sampling: bool,
    pub allows_reasoning_effort: bool,
    /// System turns must be rewritten as user turns.
    pub folds_system_into_user: bool,
    pub max_tokens_field: MaxTokensField,
}

impl ModelCapabilities {
    pub const STANDARD: ModelCapabilities = ModelCapabilities {
        allows_sampling: true,
        allows_reasoning_effort: false,
        folds_system_into_user: false,
        max_tokens_field: MaxTokensField::MaxTokens,
    };

    pub const REASONING: ModelCapabilities = ModelCapabilities {
        allows_sampling: false,
        allows_reasoning_effort: true,
        folds_system_into_user: true,
        max_tokens_field: MaxTokensField::MaxCompletionTokens,
    };

    pub const SAMPLING_RESTRICTED: ModelCapabilities = ModelCapabilities {
        allows_sampling: false,
        allows_reasoning_effort: true,
        folds_system_into_user: false,
        max_tokens_field: MaxTokensField::MaxCompletionTokens,
    };
}

struct Rule {
    name: &'static str,
    matches: fn(&str) -> bool,
    capabilities: ModelCapabilities,
}

fn is_o_series(id: &str) -> bool {
    ["o1", "o3", "o4"].iter().any(|prefix| {
        id.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('-'))
    })
}

fn is_gpt5_family(id: &str) -> bool {
    id.starts_with("gpt-5")
}

// First match wins.
const RULES: &[Rule] = &[
    Rule {
        name: "reasoning",
        matches: is_o_series,
        capabilities: ModelCapabilities::REASONING,
    },
    Rule {
        name: "sampling-restricted",
        matches: is_gpt5_family,
        capabilities: ModelCapabilities::SAMPLING_RESTRICTED,
    },
];

/// Strip any `vendor/` routing prefix and lowercase the remainder.
fn normalize(model: &str) -> String {
    model
        .rsplit('/')
        .next()
        .unwrap_or(model)
        .trim()
        .to_ascii_lowercase()
}

pub fn resolve(model: &str) -> ModelCapabilities {
    let id = normalize(model);
    for rule in RULES {
        if (rule.matches)(&id) {
            log::debug!("Model {model:?} uses {} capabilities", rule.name);
            return rule.capabilities;
        }
    }
    ModelCapabilities::STANDARD
}
