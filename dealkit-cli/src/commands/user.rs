//! User commands - register, wallet, channel, show

use anyhow::Result;
use dealkit_lib::{DealkitConfig, User, UserId};

use crate::ui;

fn print_user(user: &User) {
    ui::header(&format!("User {}", user.id));
    ui::key_value("Name", &user.mention());
    ui::key_value("Wallet", user.wallet.as_deref().unwrap_or("-"));
    ui::key_value(
        "Channel",
        &user
            .channel_id
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string()),
    );
}

pub async fn register(config: &DealkitConfig, user: i64, name: Option<&str>) -> Result<()> {
    let engine = super::open_engine(config)?;
    let user = engine.register_user(UserId(user), name).await?;
    ui::success(&format!("User {} registered", user.mention()));
    Ok(())
}

pub async fn wallet(config: &DealkitConfig, user: i64, address: &str) -> Result<()> {
    let engine = super::open_engine(config)?;
    let user = engine.set_wallet(UserId(user), address).await?;
    ui::success("Wallet saved");
    print_user(&user);
    Ok(())
}

pub async fn channel(config: &DealkitConfig, user: i64, channel_id: i64) -> Result<()> {
    let engine = super::open_engine(config)?;
    let user = engine.link_channel(UserId(user), channel_id).await?;
    ui::success("Channel linked");
    print_user(&user);
    Ok(())
}

pub async fn show(config: &DealkitConfig, user: i64) -> Result<()> {
    let engine = super::open_engine(config)?;
    match engine.user(UserId(user)).await? {
        Some(user) => print_user(&user),
        None => {
            ui::error(&format!("User {} is not registered", user));
            ui::info("Run 'dealkit user register <id>' first");
        }
    }
    Ok(())
}
