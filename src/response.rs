//! Chat Response
//!
//! Structured answer handed back to the host UI. Cards and actions are closed
//! tagged unions so the UI can match on them exhaustively.

use serde::{Deserialize, Serialize};

/// Answer produced by a skill
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cards: Vec<Card>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<Cost>,
}

impl ChatResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_card(mut self, card: Card) -> Self {
        self.cards.push(card);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
        self
    }

    pub fn with_cost(mut self, cost: Cost) -> Self {
        self.cost = Some(cost);
        self
    }
}

/// Visual summary rendered by the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Card {
    Balance {
        total: f64,
        accounts: Vec<AccountLine>,
    },
    Budget {
        category: String,
        limit: f64,
        spent: f64,
        remaining: f64,
    },
    Subscriptions {
        items: Vec<SubscriptionLine>,
        monthly_total: f64,
    },
    Forecast {
        horizon_days: u32,
        current_balance: f64,
        projected_balance: f64,
    },
    GoalProgress {
        name: String,
        current: f64,
        target: f64,
        percent: f64,
    },
    SpendingBreakdown {
        categories: Vec<CategoryTotal>,
        total: f64,
    },
    Info {
        title: String,
        body: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountLine {
    pub name: String,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionLine {
    pub name: String,
    pub monthly_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub amount: f64,
}

/// Button offered alongside an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub label: String,
    #[serde(flatten)]
    pub kind: ActionKind,
}

impl Action {
    pub fn new(label: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            label: label.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "params", rename_all = "snake_case")]
pub enum ActionKind {
    CreateBudget {
        category: Option<String>,
        amount: Option<f64>,
    },
    ViewBudget {
        budget_id: String,
    },
    ViewGoal {
        goal_id: String,
    },
    ViewTransactions {
        category: Option<String>,
    },
    AddGoal {
        name: Option<String>,
    },
    OpenSavingsCalculator,
}

/// Provenance tag for an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Cache,
    LocalMl,
    Db,
    KnowledgeBase,
    Research,
    Gpt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Answered without any model call
    #[default]
    None,
    Mini,
    Standard,
    Premium,
}

/// Cost transparency for the UI
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cost {
    pub model_tier: ModelTier,
    pub estimated_tokens: u32,
}

impl Cost {
    /// Deterministic answer, no model involved
    pub const FREE: Self = Self {
        model_tier: ModelTier::None,
        estimated_tokens: 0,
    };
}

/// Format an amount for display, e.g. `$1,234.56` or `1,234.56 EUR`
pub fn format_money(amount: f64, currency: &str) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    match currency {
        "USD" => format!("{}${}.{:02}", sign, grouped, frac),
        other => format!("{}{}.{:02} {}", sign, grouped, frac, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(1234.5, "USD"), "$1,234.50");
        assert_eq!(format_money(-12.0, "USD"), "-$12.00");
        assert_eq!(format_money(1_000_000.0, "EUR"), "1,000,000.00 EUR");
        assert_eq!(format_money(0.0, "USD"), "$0.00");
    }

    #[test]
    fn test_card_serialization_is_tagged() {
        let card = Card::Info {
            title: "HYSA".to_string(),
            body: "text".to_string(),
        };
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["type"], "info");
        assert_eq!(json["title"], "HYSA");
    }

    #[test]
    fn test_action_serialization() {
        let action = Action::new(
            "Create budget",
            ActionKind::CreateBudget {
                category: Some("Dining".to_string()),
                amount: Some(200.0),
            },
        );
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["label"], "Create budget");
        assert_eq!(json["action"], "create_budget");
        assert_eq!(json["params"]["category"], "Dining");
    }

    #[test]
    fn test_with_source_dedupes() {
        let response = ChatResponse::new("hi")
            .with_source(Source::Db)
            .with_source(Source::Db);
        assert_eq!(response.sources, vec![Source::Db]);
    }
}
