//! Built-in finance skills
//!
//! Deterministic answers computed from the context snapshot. None of these
//! call a model, so every answer carries `Cost::FREE`.

use super::registry::SkillRegistry;
use super::types::{
    FnSolver, Skill, SkillValidationError, SlotKind, SlotSpec, SlotValue, StageOutput,
};
use crate::context::ChatContext;
use crate::response::{
    format_money, AccountLine, Action, ActionKind, Card, CategoryTotal, ChatResponse, Cost, Source,
    SubscriptionLine,
};
use anyhow::{Context as _, Result};
use chrono::Duration as ChronoDuration;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Typical rates used for the HYSA comparison
const HYSA_APY: f64 = 0.045;
const BIG_BANK_APY: f64 = 0.004;

/// Forecast horizon
const FORECAST_DAYS: u32 = 30;

const AMOUNT_PATTERN: &str = r"\$?(\d[\d,]*(?:\.\d{1,2})?)";
const CATEGORY_PATTERN: &str = r"(?i)\b(?:for|on)\s+(?:(?:my|the|a|an|our)\s+)?([a-z]{2,})";

static AMOUNT_SLOT: Lazy<Option<SlotSpec>> = Lazy::new(|| amount_slot().ok());
static CATEGORY_SLOT: Lazy<Option<SlotSpec>> = Lazy::new(|| category_slot().ok());

struct GlossaryEntry {
    term: &'static str,
    pattern: &'static str,
    definition: &'static str,
}

static GLOSSARY: &[GlossaryEntry] = &[
    GlossaryEntry {
        term: "APR",
        pattern: r"(?i)\bapr\b|annual percentage rate",
        definition: "APR (annual percentage rate) is the yearly cost of borrowing, including \
                     interest and most fees, before compounding.",
    },
    GlossaryEntry {
        term: "APY",
        pattern: r"(?i)\bapy\b|annual percentage yield",
        definition: "APY (annual percentage yield) is what a deposit earns in a year once \
                     compounding is included. Compare savings accounts by APY.",
    },
    GlossaryEntry {
        term: "Emergency fund",
        pattern: r"(?i)\bemergency fund",
        definition: "An emergency fund is cash set aside for unexpected costs, usually three \
                     to six months of essential expenses, kept somewhere easy to reach.",
    },
    GlossaryEntry {
        term: "Compound interest",
        pattern: r"(?i)\bcompound(ing)? interest\b",
        definition: "Compound interest is interest earned on both the original deposit and \
                     the interest already added to it, so growth speeds up over time.",
    },
    GlossaryEntry {
        term: "Credit score",
        pattern: r"(?i)\bcredit score\b",
        definition: "A credit score is a number, typically 300 to 850, that summarises how \
                     reliably you have repaid debt. Lenders use it to price loans.",
    },
    GlossaryEntry {
        term: "Index fund",
        pattern: r"(?i)\bindex funds?\b",
        definition: "An index fund holds every security in a market index, such as the S&P \
                     500, giving broad diversification at a low fee.",
    },
    GlossaryEntry {
        term: "401(k)",
        pattern: r"(?i)\b401\s?\(?k\)?",
        definition: "A 401(k) is an employer-sponsored retirement account funded from your \
                     paycheck before tax. Many employers match part of what you contribute.",
    },
    GlossaryEntry {
        term: "Roth IRA",
        pattern: r"(?i)\broth\b",
        definition: "A Roth IRA is a retirement account funded with after-tax money. \
                     Qualified withdrawals in retirement are tax free.",
    },
    GlossaryEntry {
        term: "Net worth",
        pattern: r"(?i)\bnet worth\b",
        definition: "Net worth is everything you own minus everything you owe.",
    },
    GlossaryEntry {
        term: "Sinking fund",
        pattern: r"(?i)\bsinking fund",
        definition: "A sinking fund is money saved a little at a time for a known future \
                     expense, such as car insurance or holiday gifts.",
    },
];

static GLOSSARY_INDEX: Lazy<Vec<(Regex, &'static GlossaryEntry)>> = Lazy::new(|| {
    GLOSSARY
        .iter()
        .filter_map(|entry| Regex::new(entry.pattern).ok().map(|re| (re, entry)))
        .collect()
});

/// Register every built-in skill. Returns how many were newly added.
pub fn register_builtin_skills(registry: &SkillRegistry) -> Result<usize, SkillValidationError> {
    let skills = [
        hysa_skill()?,
        balance_skill()?,
        create_budget_skill()?,
        budget_status_skill()?,
        subscriptions_skill()?,
        goal_progress_skill()?,
        spending_breakdown_skill()?,
        forecast_skill()?,
        glossary_skill()?,
    ];

    let mut added = 0;
    for skill in skills {
        if registry.register(skill)? {
            added += 1;
        }
    }
    info!("Registered {} built-in skills", added);
    Ok(added)
}

fn hysa_skill() -> Result<Skill, SkillValidationError> {
    Skill::builder("hysa")
        .description("Explains high-yield savings accounts")
        .priority(90)
        .matching(r"(?i)\bhysa\b")
        .matching(r"(?i)high[-\s]?yield\s+savings")
        .micro_solver_fn(explain_hysa)
        .build()
}

fn balance_skill() -> Result<Skill, SkillValidationError> {
    Skill::builder("balance")
        .description("Totals account balances")
        .priority(70)
        .matching(r"(?i)\bbalances?\b")
        .matching(r"(?i)how much (money|cash) do i have")
        .matching(r"(?i)\bin my accounts?\b")
        .micro_solver_fn(answer_balance)
        .build()
}

fn create_budget_skill() -> Result<Skill, SkillValidationError> {
    Skill::builder("create_budget")
        .description("Offers to create a budget from an amount and category")
        .priority(65)
        .matching(r"(?i)\b(create|make|set up|start|add)\b.*\bbudget\b")
        .slot(amount_slot()?)
        .slot(category_slot()?)
        .micro_solver_fn(propose_budget)
        .build()
}

fn amount_slot() -> Result<SlotSpec, SkillValidationError> {
    Ok(SlotSpec::new("amount", SlotKind::Amount)
        .with_pattern(AMOUNT_PATTERN)?
        .with_validator(positive_amount))
}

fn category_slot() -> Result<SlotSpec, SkillValidationError> {
    SlotSpec::new("category", SlotKind::Category).with_pattern(CATEGORY_PATTERN)
}

fn budget_status_skill() -> Result<Skill, SkillValidationError> {
    Skill::builder("budget_status")
        .description("Reports spending against budgets")
        .priority(60)
        .matching(r"(?i)\bbudgets?\b")
        .matching(r"(?i)\bover ?spen(t|d|ding)\b")
        .micro_solver_fn(answer_budget_status)
        .build()
}

fn subscriptions_skill() -> Result<Skill, SkillValidationError> {
    Skill::builder("subscriptions")
        .description("Lists recurring charges")
        .priority(60)
        .matching(r"(?i)\b(subscriptions?|recurring|memberships?)\b")
        .micro_solver_fn(answer_subscriptions)
        .build()
}

fn goal_progress_skill() -> Result<Skill, SkillValidationError> {
    Skill::builder("goal_progress")
        .description("Reports progress towards savings goals")
        .priority(55)
        .matching(r"(?i)\bgoals?\b")
        .matching(r"(?i)\bsaving (up )?for\b")
        .micro_solver_fn(answer_goal_progress)
        .build()
}

fn spending_breakdown_skill() -> Result<Skill, SkillValidationError> {
    Skill::builder("spending_breakdown")
        .description("Breaks spending down by category")
        .priority(50)
        .matching(r"(?i)\b(spend|spent|spending|expenses)\b")
        .micro_solver_fn(collect_spending)
        .composer_fn(compose_spending)
        .build()
}

fn forecast_skill() -> Result<Skill, SkillValidationError> {
    Skill::builder("forecast")
        .description("Projects the balance a month ahead")
        .priority(45)
        .matching(r"(?i)\b(forecast|projection|projected)\b")
        .matching(r"(?i)\bend of (the )?month\b")
        .matching(r"(?i)\bwill i have\b")
        .micro_solver_fn(answer_forecast)
        .build()
}

fn glossary_skill() -> Result<Skill, SkillValidationError> {
    Skill::builder("finance_glossary")
        .description("Defines common personal-finance terms")
        .priority(10)
        .match_with(|question| GLOSSARY_INDEX.iter().any(|(re, _)| re.is_match(question)))
        .knowledge_base(FnSolver::new(search_glossary))
        .build()
}

fn positive_amount(value: &SlotValue) -> std::result::Result<(), String> {
    match value {
        SlotValue::Amount(a) if *a > 0.0 => Ok(()),
        _ => Err("amount must be positive".to_string()),
    }
}

fn deterministic(response: ChatResponse) -> ChatResponse {
    response.with_cost(Cost::FREE)
}

fn explain_hysa(_question: &str, ctx: &ChatContext) -> Result<Option<StageOutput>> {
    let mut response = ChatResponse::new(
        "A high-yield savings account (HYSA) is a savings account that pays a much higher \
         interest rate than a typical bank savings account, often ten times as much. It is \
         usually offered by online banks, stays FDIC insured, and keeps your money available \
         for withdrawals.",
    )
    .with_card(Card::Info {
        title: "High-yield savings".to_string(),
        body: format!(
            "Typical HYSA APY: {:.1}%. Typical big-bank APY: {:.1}%.",
            HYSA_APY * 100.0,
            BIG_BANK_APY * 100.0
        ),
    })
    .with_action(Action::new(
        "Compare savings rates",
        ActionKind::OpenSavingsCalculator,
    ))
    .with_source(Source::KnowledgeBase);

    let savings = ctx.savings_balance();
    if savings > 0.0 {
        let currency = ctx.currency_code();
        let gain = savings * (HYSA_APY - BIG_BANK_APY);
        response = response
            .with_details(format!(
                "With {} in savings, a HYSA could earn about {} more per year.",
                format_money(savings, currency),
                format_money(gain, currency)
            ))
            .with_card(Card::Balance {
                total: savings,
                accounts: ctx
                    .accounts
                    .iter()
                    .filter(|a| a.kind == crate::context::AccountKind::Savings)
                    .map(|a| AccountLine {
                        name: a.name.clone(),
                        balance: a.balance,
                    })
                    .collect(),
            })
            .with_source(Source::Db);
    }

    Ok(Some(
        StageOutput::response(deterministic(response)).with_usefulness(4.5),
    ))
}

fn answer_balance(_question: &str, ctx: &ChatContext) -> Result<Option<StageOutput>> {
    if ctx.accounts.is_empty() {
        return Ok(None);
    }

    let currency = ctx.currency_code();
    let total = ctx.total_balance();
    let message = format!(
        "Your total balance across {} account{} is {}.",
        ctx.accounts.len(),
        if ctx.accounts.len() == 1 { "" } else { "s" },
        format_money(total, currency)
    );

    let response = ChatResponse::new(message)
        .with_card(Card::Balance {
            total,
            accounts: ctx
                .accounts
                .iter()
                .map(|a| AccountLine {
                    name: a.name.clone(),
                    balance: a.balance,
                })
                .collect(),
        })
        .with_source(Source::Db);

    Ok(Some(
        StageOutput::response(deterministic(response)).with_usefulness(4.5),
    ))
}

fn propose_budget(question: &str, ctx: &ChatContext) -> Result<Option<StageOutput>> {
    let amount = match AMOUNT_SLOT.as_ref().and_then(|slot| slot.extract(question)) {
        Some(SlotValue::Amount(a)) => Some(a),
        _ => None,
    };
    let category = match CATEGORY_SLOT.as_ref().and_then(|slot| slot.extract(question)) {
        Some(SlotValue::Category(c)) => Some(c),
        _ => None,
    };

    let currency = ctx.currency_code();
    let (message, usefulness) = match (&category, amount) {
        (Some(category), Some(amount)) => {
            if let Some(existing) = ctx
                .budgets
                .iter()
                .find(|b| b.category.eq_ignore_ascii_case(category))
            {
                (
                    format!(
                        "You already have a {} budget of {}. I can replace it with {} per month.",
                        existing.category,
                        format_money(existing.limit, currency),
                        format_money(amount, currency)
                    ),
                    4.0,
                )
            } else {
                (
                    format!(
                        "I can set up a {} budget of {} per month.",
                        category,
                        format_money(amount, currency)
                    ),
                    4.5,
                )
            }
        }
        (Some(category), None) => (
            format!("How much would you like to budget for {} each month?", category),
            3.0,
        ),
        (None, Some(amount)) => (
            format!(
                "Which category should the {} monthly budget cover?",
                format_money(amount, currency)
            ),
            3.0,
        ),
        (None, None) => (
            "Tell me a category and a monthly amount, for example \"create a $400 budget for groceries\"."
                .to_string(),
            3.0,
        ),
    };

    let response = ChatResponse::new(message).with_action(Action::new(
        "Create budget",
        ActionKind::CreateBudget { category, amount },
    ));

    Ok(Some(
        StageOutput::response(deterministic(response)).with_usefulness(usefulness),
    ))
}

fn answer_budget_status(question: &str, ctx: &ChatContext) -> Result<Option<StageOutput>> {
    if ctx.budgets.is_empty() {
        return Ok(None);
    }

    let currency = ctx.currency_code();
    let lowered = question.to_lowercase();
    let focused: Vec<_> = ctx
        .budgets
        .iter()
        .filter(|b| lowered.contains(&b.category.to_lowercase()))
        .collect();
    let budgets = if focused.is_empty() {
        ctx.budgets.iter().collect()
    } else {
        focused
    };

    let message = if let [budget] = budgets.as_slice() {
        if budget.is_over() {
            format!(
                "You are over your {} budget by {}: {} spent of {}.",
                budget.category,
                format_money(-budget.remaining(), currency),
                format_money(budget.spent, currency),
                format_money(budget.limit, currency)
            )
        } else {
            format!(
                "You've used {:.0}% of your {} budget: {} of {}, {} left.",
                budget.utilization() * 100.0,
                budget.category,
                format_money(budget.spent, currency),
                format_money(budget.limit, currency),
                format_money(budget.remaining(), currency)
            )
        }
    } else {
        let over: Vec<&str> = budgets
            .iter()
            .filter(|b| b.is_over())
            .map(|b| b.category.as_str())
            .collect();
        let spent: f64 = budgets.iter().map(|b| b.spent).sum();
        let limit: f64 = budgets.iter().map(|b| b.limit).sum();
        let summary = format!(
            "Across {} budgets you've spent {} of {}.",
            budgets.len(),
            format_money(spent, currency),
            format_money(limit, currency)
        );
        if over.is_empty() {
            format!("{} All budgets are on track.", summary)
        } else {
            format!("{} Over budget: {}.", summary, over.join(", "))
        }
    };

    let mut response = ChatResponse::new(message).with_source(Source::Db);
    for budget in &budgets {
        response = response
            .with_card(Card::Budget {
                category: budget.category.clone(),
                limit: budget.limit,
                spent: budget.spent,
                remaining: budget.remaining(),
            })
            .with_action(Action::new(
                format!("View {} budget", budget.category),
                ActionKind::ViewBudget {
                    budget_id: budget.id.clone(),
                },
            ));
    }

    Ok(Some(
        StageOutput::response(deterministic(response)).with_usefulness(4.5),
    ))
}

fn answer_subscriptions(_question: &str, ctx: &ChatContext) -> Result<Option<StageOutput>> {
    if ctx.recurring_expenses.is_empty() {
        return Ok(None);
    }

    let currency = ctx.currency_code();
    let mut items: Vec<SubscriptionLine> = ctx
        .recurring_expenses
        .iter()
        .map(|r| SubscriptionLine {
            name: r.name.clone(),
            monthly_cost: r.monthly_cost(),
        })
        .collect();
    items.sort_by(|a, b| {
        b.monthly_cost
            .partial_cmp(&a.monthly_cost)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let monthly_total = ctx.monthly_recurring_total();

    let mut message = format!(
        "You have {} recurring charge{} costing about {} per month ({} per year).",
        items.len(),
        if items.len() == 1 { "" } else { "s" },
        format_money(monthly_total, currency),
        format_money(monthly_total * 12.0, currency)
    );
    if let Some(top) = items.first() {
        message.push_str(&format!(
            " The largest is {} at {} per month.",
            top.name,
            format_money(top.monthly_cost, currency)
        ));
    }

    let response = ChatResponse::new(message)
        .with_card(Card::Subscriptions {
            items,
            monthly_total,
        })
        .with_source(Source::Db);

    Ok(Some(
        StageOutput::response(deterministic(response)).with_usefulness(4.5),
    ))
}

fn answer_goal_progress(_question: &str, ctx: &ChatContext) -> Result<Option<StageOutput>> {
    let currency = ctx.currency_code();

    if ctx.goals.is_empty() {
        let response = ChatResponse::new(
            "You haven't set any savings goals yet. Adding one lets me track your progress.",
        )
        .with_action(Action::new("Add a goal", ActionKind::AddGoal { name: None }));
        return Ok(Some(
            StageOutput::response(deterministic(response)).with_usefulness(3.0),
        ));
    }

    let lines: Vec<String> = ctx
        .goals
        .iter()
        .map(|g| {
            let mut line = format!(
                "{}: {} of {} ({:.0}%)",
                g.name,
                format_money(g.current_amount, currency),
                format_money(g.target_amount, currency),
                g.percent_complete()
            );
            if let Some(date) = g.target_date {
                line.push_str(&format!(", due {}", date));
            }
            line
        })
        .collect();

    let mut response = ChatResponse::new(format!("Goal progress: {}.", lines.join("; ")))
        .with_source(Source::Db);
    for goal in &ctx.goals {
        response = response
            .with_card(Card::GoalProgress {
                name: goal.name.clone(),
                current: goal.current_amount,
                target: goal.target_amount,
                percent: goal.percent_complete(),
            })
            .with_action(Action::new(
                format!("View {}", goal.name),
                ActionKind::ViewGoal {
                    goal_id: goal.id.clone(),
                },
            ));
    }

    Ok(Some(
        StageOutput::response(deterministic(response)).with_usefulness(4.5),
    ))
}

/// Data handed from the spending micro-solver to its composer
#[derive(Debug, Serialize, Deserialize)]
struct SpendingData {
    currency: String,
    categories: Vec<CategoryTotal>,
    total: f64,
}

fn collect_spending(_question: &str, ctx: &ChatContext) -> Result<Option<StageOutput>> {
    let categories: Vec<CategoryTotal> = ctx
        .outflows_by_category()
        .into_iter()
        .map(|(category, amount)| CategoryTotal { category, amount })
        .collect();
    if categories.is_empty() {
        return Ok(None);
    }

    let data = SpendingData {
        currency: ctx.currency_code().to_string(),
        total: categories.iter().map(|c| c.amount).sum(),
        categories,
    };
    Ok(Some(StageOutput::data(serde_json::to_value(data)?)))
}

fn compose_spending(_question: &str, data: &Value, _ctx: &ChatContext) -> Result<Option<StageOutput>> {
    let data: SpendingData =
        serde_json::from_value(data.clone()).context("malformed spending data")?;
    let Some(top) = data.categories.first() else {
        return Ok(None);
    };

    let share = if data.total > 0.0 {
        top.amount / data.total * 100.0
    } else {
        0.0
    };
    let message = format!(
        "You spent {} across {} categor{}. {} was the largest at {} ({:.0}%).",
        format_money(data.total, &data.currency),
        data.categories.len(),
        if data.categories.len() == 1 { "y" } else { "ies" },
        top.category,
        format_money(top.amount, &data.currency),
        share
    );
    let top_category = top.category.clone();

    let response = ChatResponse::new(message)
        .with_card(Card::SpendingBreakdown {
            categories: data.categories,
            total: data.total,
        })
        .with_action(Action::new(
            format!("View {} transactions", top_category),
            ActionKind::ViewTransactions {
                category: Some(top_category),
            },
        ))
        .with_source(Source::Db);

    Ok(Some(
        StageOutput::response(deterministic(response)).with_usefulness(4.5),
    ))
}

/// Average daily outflow over the 30 days ending at the latest transaction
fn recent_daily_outflow(ctx: &ChatContext) -> Option<f64> {
    let latest = ctx.latest_transaction_date()?;
    let start = latest - ChronoDuration::days(29);
    let spent: f64 = ctx
        .transactions
        .iter()
        .filter(|t| t.amount < 0.0 && t.date >= start)
        .map(|t| -t.amount)
        .sum();
    Some(spent / 30.0)
}

fn answer_forecast(_question: &str, ctx: &ChatContext) -> Result<Option<StageOutput>> {
    if ctx.accounts.is_empty() {
        return Ok(None);
    }

    let currency = ctx.currency_code();
    let horizon = f64::from(FORECAST_DAYS);
    let current = ctx.total_balance();
    let income = ctx
        .user_profile
        .as_ref()
        .and_then(|p| p.monthly_income)
        .unwrap_or(0.0);

    // Recent transactions already include recurring bills
    let (outflow, basis) = match recent_daily_outflow(ctx) {
        Some(daily) => (daily * horizon, "your last 30 days of spending"),
        None => (
            ctx.monthly_recurring_total() * horizon / 30.0,
            "your recurring bills",
        ),
    };
    let projected = current + income * horizon / 30.0 - outflow;

    let message = format!(
        "Based on {}, your balance should be about {} in {} days (currently {}).",
        basis,
        format_money(projected, currency),
        FORECAST_DAYS,
        format_money(current, currency)
    );

    let mut response = ChatResponse::new(message)
        .with_card(Card::Forecast {
            horizon_days: FORECAST_DAYS,
            current_balance: current,
            projected_balance: projected,
        })
        .with_source(Source::Db);
    if income <= 0.0 {
        response = response.with_details("No monthly income on file, so none is included.");
    }

    Ok(Some(
        StageOutput::response(deterministic(response)).with_usefulness(4.0),
    ))
}

fn search_glossary(question: &str, _ctx: &ChatContext) -> Result<Option<StageOutput>> {
    let hits: Vec<&GlossaryEntry> = GLOSSARY_INDEX
        .iter()
        .filter(|(re, _)| re.is_match(question))
        .map(|(_, entry)| *entry)
        .collect();
    let Some(first) = hits.first() else {
        return Ok(None);
    };

    let mut response = ChatResponse::new(first.definition).with_source(Source::KnowledgeBase);
    for entry in &hits {
        response = response.with_card(Card::Info {
            title: entry.term.to_string(),
            body: entry.definition.to_string(),
        });
    }

    Ok(Some(
        StageOutput::response(deterministic(response))
            .with_usefulness(4.0)
            .with_matched_pattern(first.pattern),
    ))
}
