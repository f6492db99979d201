//! Rule and scheduled rule endpoints.

use api_types::{
    rule::{
        DryRun, DryRunResponse, RuleNew, RuleView, RulesResponse, ScheduleRuleNew,
        ScheduleRuleView, ScheduleRulesResponse,
    },
    transaction::TransactionView,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{Rule, ScheduleRule};

use crate::{ServerError, server::ServerState, views};

fn apply_rule(mut rule: Rule, payload: RuleNew) -> Rule {
    rule.title = payload.title;
    rule.script = payload.script;
    rule.sort_order = payload.sort_order;
    rule.group_name = payload.group_name;
    rule.enabled = payload.enabled;
    rule.is_final_rule = payload.is_final_rule;
    rule
}

fn apply_schedule(mut rule: ScheduleRule, payload: ScheduleRuleNew) -> ScheduleRule {
    rule.title = payload.title;
    rule.script = payload.script;
    rule.cron_expression = payload.cron_expression.trim().to_string();
    rule.group_name = payload.group_name;
    rule.enabled = payload.enabled;
    rule
}

pub async fn list(State(state): State<ServerState>) -> Result<Json<RulesResponse>, ServerError> {
    let rules = state.engine.list_rules().await?;
    Ok(Json(RulesResponse {
        rules: rules.into_iter().map(views::rule).collect(),
    }))
}

pub async fn get(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<Json<RuleView>, ServerError> {
    Ok(Json(views::rule(state.engine.rule(id).await?)))
}

pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<RuleNew>,
) -> Result<(StatusCode, Json<RuleView>), ServerError> {
    let rule = apply_rule(Rule::new(&payload.title, &payload.script), payload);
    let created = state.engine.create_rule(rule).await?;
    Ok((StatusCode::CREATED, Json(views::rule(created))))
}

pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
    Json(payload): Json<RuleNew>,
) -> Result<Json<RuleView>, ServerError> {
    let current = state.engine.rule(id).await?;
    let updated = state.engine.update_rule(apply_rule(current, payload)).await?;
    Ok(Json(views::rule(updated)))
}

pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_rule(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn dry_run(
    State(state): State<ServerState>,
    Json(payload): Json<DryRun>,
) -> Result<Json<DryRunResponse>, ServerError> {
    let result = state
        .engine
        .dry_run_rule(&payload.script, payload.transaction_id)
        .await?;
    Ok(Json(DryRunResponse {
        before: views::transaction(result.before),
        after: views::transaction(result.after),
        modified: result.modified,
    }))
}

pub async fn list_schedules(
    State(state): State<ServerState>,
) -> Result<Json<ScheduleRulesResponse>, ServerError> {
    let rules = state.engine.list_schedule_rules().await?;
    Ok(Json(ScheduleRulesResponse {
        rules: rules.into_iter().map(views::schedule_rule).collect(),
    }))
}

pub async fn get_schedule(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<Json<ScheduleRuleView>, ServerError> {
    Ok(Json(views::schedule_rule(
        state.engine.schedule_rule(id).await?,
    )))
}

pub async fn create_schedule(
    State(state): State<ServerState>,
    Json(payload): Json<ScheduleRuleNew>,
) -> Result<(StatusCode, Json<ScheduleRuleView>), ServerError> {
    let rule = ScheduleRule::new(&payload.title, &payload.script, &payload.cron_expression);
    let created = state
        .engine
        .create_schedule_rule(apply_schedule(rule, payload))
        .await?;
    Ok((StatusCode::CREATED, Json(views::schedule_rule(created))))
}

pub async fn update_schedule(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
    Json(payload): Json<ScheduleRuleNew>,
) -> Result<Json<ScheduleRuleView>, ServerError> {
    let current = state.engine.schedule_rule(id).await?;
    let updated = state
        .engine
        .update_schedule_rule(apply_schedule(current, payload))
        .await?;
    Ok(Json(views::schedule_rule(updated)))
}

pub async fn delete_schedule(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_schedule_rule(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Run a scheduled rule now, outside its cron schedule.
pub async fn run_schedule(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<(StatusCode, Json<TransactionView>), ServerError> {
    let rule = state.engine.schedule_rule(id).await?;
    let created = state.engine.run_schedule_rule(&rule).await?;
    Ok((StatusCode::CREATED, Json(views::transaction(created))))
}
