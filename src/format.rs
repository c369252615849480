use chrono::{DateTime, Utc};

use crate::trending::{TrendingCoin, TrendingNft};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn header(display_name: &str, title: &str, now: DateTime<Utc>) -> String {
    format!(
        "GM {}!\n{} ({})\n\n",
        display_name,
        title,
        now.format(TIMESTAMP_FORMAT)
    )
}

/// Caption for one trending coin, addressed to `display_name`
pub fn format_coin_message(display_name: &str, coin: &TrendingCoin, now: DateTime<Utc>) -> String {
    let rank = coin
        .market_cap_rank
        .map(|r| r.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let mut message = header(display_name, "TOP TRENDING COINS ON COINGECKO", now);
    message.push_str(&format!("💥 Name: {}\n", coin.name));
    message.push_str(&format!("   Symbol: {}\n", coin.symbol));
    message.push_str(&format!("   Coin ID: {}\n", coin.coin_id));
    message.push_str(&format!("   Market Cap Rank: {}\n", rank));
    message.push_str(&format!("   Market Cap BTC: {}\n", coin.market_cap_btc));
    message.push_str(&format!("   Market Cap: {}\n", coin.market_cap));
    message.push_str(&format!("   Total Volume: {}\n", coin.total_volume));
    message.push_str(&format!("   Total Volume BTC: {}\n", coin.total_volume_btc));
    message.push_str(&format!("   See more: {}\n", coin.chart_link));
    message
}

/// Caption for one trending NFT collection, addressed to `display_name`
pub fn format_nft_message(display_name: &str, nft: &TrendingNft, now: DateTime<Utc>) -> String {
    let mut message = header(display_name, "TOP TRENDING NFTS ON COINGECKO", now);
    message.push_str(&format!("💥 Name: {}\n", nft.name));
    message.push_str(&format!("   Symbol: {}\n", nft.symbol));
    message.push_str(&format!("   NFT Contract ID: {}\n", nft.nft_contract_id));
    message.push_str(&format!("   Floor Price: {}\n", nft.floor_price));
    message.push_str(&format!(
        "   24h Floor Price Change: {}%\n",
        nft.floor_price_24h_percentage_change
    ));
    message.push_str(&format!("   24h Volume: {}\n", nft.h24_volume));
    message.push_str(&format!(
        "   24h Average Sale Price: {}\n",
        nft.h24_average_sale_price
    ));
    message.push_str(&format!("   See more: {}\n", nft.chart_link));
    message
}
