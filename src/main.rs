//! sheetboard CLI — authorize, read a sheet, print sprint insights.
//!
//! Runs the browser consent flow against a localhost redirect, fetches the
//! requested tab, normalizes it, and prints the derived sprint metrics.

use std::error::Error;
use std::net::TcpListener;

use sheetboard::config::OauthConfig;
use sheetboard::google::auth::{capture_redirect_code, HttpTokenEndpoint};
use sheetboard::google::sheets::{spreadsheet_id_from_url, SheetsClient};
use sheetboard::insights;
use sheetboard::session::{CredentialManager, Session};
use sheetboard::table::Table;

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(e) = run().await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let sheet_url = args
        .next()
        .ok_or("usage: sheetboard <sheet-url-or-id> [tab-name]")?;
    let requested_tab = args.next();

    let spreadsheet_id =
        spreadsheet_id_from_url(&sheet_url).ok_or("could not find a spreadsheet id in that URL")?;

    // Capture the consent redirect on a random localhost port.
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let mut config = OauthConfig::load_default()?;
    config.redirect_uri = format!("http://localhost:{}", listener.local_addr()?.port());

    let manager = CredentialManager::new(config.clone(), HttpTokenEndpoint::new(config));
    let mut session = Session::new();

    let auth_url = manager.authorization_url();
    println!("Authorize read-only sheet access in your browser:\n\n  {}\n", auth_url);
    if let Err(e) = open::that(&auth_url) {
        log::warn!("could not open browser: {}", e);
    }

    let code = capture_redirect_code(&listener)?;
    manager.complete_authorization(&mut session, &code).await?;

    if !manager.check(&mut session).await.is_authenticated() {
        return Err("authentication did not produce a usable credential".into());
    }
    let token = session
        .access_token()
        .ok_or("no access token in session")?
        .to_string();

    let sheets = SheetsClient::new();
    let tabs = sheets.sheet_names(&token, &spreadsheet_id).await?;
    let tab = match requested_tab {
        Some(name) => name,
        None => tabs.first().cloned().ok_or("spreadsheet has no sheets")?,
    };
    println!("Reading '{}' (available: {})", tab, tabs.join(", "));

    let grid = sheets.read_grid(&token, &spreadsheet_id, &tab).await?;
    let mut table = Table::from_grid(&grid);
    if table.is_empty() {
        println!("The selected sheet is empty.");
        manager.logout(&mut session);
        return Ok(());
    }

    table.coerce_numeric("estimate");
    table.coerce_numeric("actual");
    table.derive_difference("actual", "estimate", "dev time difference");

    let total_estimate = table.sum_numeric("estimate");
    let total_actual = table.sum_numeric("actual");

    println!("\nSprint Health");
    println!("  Estimate total: {:.1}h", total_estimate);
    println!("  Actual total:   {:.1}h", total_actual);
    println!(
        "  Velocity:       {:.2}",
        insights::velocity(total_actual, total_estimate)
    );
    println!(
        "  Status:         {}",
        insights::schedule_status(total_estimate, total_actual)
    );

    let risks = insights::risk_distribution(&table, "risks");
    println!("\nRisk Distribution");
    println!("  No risk:            {}", risks.no_risk);
    println!("  Not yet identified: {}", risks.not_yet_identified);
    println!("  At risk:            {}", risks.risk);

    let name_column = if table.column("task_name").is_some() {
        "task_name"
    } else {
        "task"
    };
    println!("\nTasks");
    for row in insights::task_breakdown(&table, name_column, "estimate", "actual") {
        println!(
            "  {:<24} estimate {:>5.1}h  actual {:>5.1}h  {:?}",
            row.name, row.estimate, row.actual, row.status
        );
    }

    manager.logout(&mut session);
    Ok(())
}
