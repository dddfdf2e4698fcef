use crate::error::Error;
use crate::models::PriceOverview;
use crate::services::{fetch_usd_to_eur, MarketClient, PriceFormatter};

pub fn run(item: String) {
    match query_price(&item) {
        Ok((overview, formatter)) => {
            println!("💰 {}", item);
            match &overview.lowest_price {
                Some(usd) => {
                    println!("   Lowest sell: {} ({})", formatter.usd_to_eur(usd), usd)
                }
                None => println!("   Lowest sell: n/a"),
            }
            match &overview.buy_order_price {
                Some(usd) => {
                    println!("   Highest buy: {} ({})", formatter.usd_to_eur(usd), usd)
                }
                None => println!("   Highest buy: n/a"),
            }
        }
        Err(e) => {
            eprintln!("❌ Price lookup failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn query_price(item: &str) -> Result<(PriceOverview, PriceFormatter), Error> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Config(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        // Refresh the conversion rate before the query; the formatter keeps
        // it as a plain value from here on.
        let formatter = PriceFormatter::new(fetch_usd_to_eur().await);
        let market = MarketClient::new()?;
        let overview = market.fetch_price_overview(item).await?;
        Ok((overview, formatter))
    })
}
