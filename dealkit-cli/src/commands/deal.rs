//! Deal commands - create, inspect, transition, list

use anyhow::{Context, Result};
use dealkit_lib::{dispatch_all, Amount, Category, DealEvent, DealkitConfig, UserId};

use super::{parse_deal_id, ConsoleNotifier};
use crate::ui;

pub async fn create(
    config: &DealkitConfig,
    seller: i64,
    amount: &str,
    category: &str,
    item: &str,
    description: &str,
) -> Result<()> {
    let amount = Amount::parse_user_input(amount).context("invalid amount")?;
    let category: Category = category.parse()?;

    let engine = super::open_engine(config)?;
    let id = engine
        .create_deal(UserId(seller), amount, category, item, description)
        .await?;
    let deal = engine.get_deal(&id).await?;

    ui::success("Deal created");
    ui::deal(&deal, config.bot_username.as_deref());
    if config.bot_username.is_none() {
        ui::info(&format!("Buyers can join with 'dealkit deal join {} --user <id>'", id));
    }
    Ok(())
}

pub async fn show(config: &DealkitConfig, deal_id: &str) -> Result<()> {
    let deal_id = parse_deal_id(deal_id)?;
    let engine = super::open_engine(config)?;
    let deal = engine.get_deal(&deal_id).await?;
    ui::deal(&deal, config.bot_username.as_deref());
    Ok(())
}

pub async fn preview(config: &DealkitConfig, deal_id: &str, user: i64) -> Result<()> {
    let deal_id = parse_deal_id(deal_id)?;
    let engine = super::open_engine(config)?;
    let deal = engine.preview_join(&deal_id, UserId(user)).await?;
    ui::deal(&deal, None);
    ui::info(&format!("Join with 'dealkit deal join {} --user {}'", deal.id, user));
    Ok(())
}

/// Fire one lifecycle event and print who gets told what.
pub async fn transition(
    config: &DealkitConfig,
    deal_id: &str,
    event: DealEvent,
    user: i64,
) -> Result<()> {
    let deal_id = parse_deal_id(deal_id)?;
    let engine = super::open_engine(config)?;
    let outcome = engine
        .apply_transition(&deal_id, event, UserId(user))
        .await
        .with_context(|| format!("{} rejected", event))?;

    ui::success(&format!(
        "Deal {}: {} → {}",
        outcome.deal.id, outcome.transition.from, outcome.transition.to
    ));
    dispatch_all(&ConsoleNotifier, &outcome.notifications).await;
    Ok(())
}

pub async fn list(config: &DealkitConfig, user: i64) -> Result<()> {
    let engine = super::open_engine(config)?;
    let deals = engine.deals_for_user(UserId(user)).await?;
    if deals.is_empty() {
        ui::info(&format!("User {} has no deals", user));
        return Ok(());
    }
    ui::header(&format!("Deals of user {} ({})", user, deals.len()));
    ui::deal_list(&deals);
    Ok(())
}

pub async fn open(config: &DealkitConfig) -> Result<()> {
    let engine = super::open_engine(config)?;
    let deals = engine.open_deals().await?;
    if deals.is_empty() {
        ui::info("No open deals");
        return Ok(());
    }
    ui::header(&format!("Open deals ({})", deals.len()));
    ui::deal_list(&deals);
    Ok(())
}
