use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const COIN_PAGE_URL: &str = "https://www.coingecko.com/en/coins";
const NFT_PAGE_URL: &str = "https://www.coingecko.com/en/nft";
const TRENDING_NFTS_URL: &str = "https://www.coingecko.com/en/highlights/trending-nfts";

/// A trending coin flattened out of the `/search/trending` payload
#[derive(Debug, Clone, PartialEq)]
pub struct TrendingCoin {
    pub name: String,
    pub symbol: String,
    pub coin_id: String,
    /// `None` when CoinGecko reports the rank as null
    pub market_cap_rank: Option<u32>,
    pub market_cap_btc: String,
    pub market_cap: String,
    pub total_volume: String,
    pub total_volume_btc: String,
    pub chart_link: String,
    pub thumb_url: String,
}

/// A trending NFT collection flattened out of the `/search/trending` payload
#[derive(Debug, Clone, PartialEq)]
pub struct TrendingNft {
    pub name: String,
    pub symbol: String,
    pub nft_contract_id: String,
    pub floor_price: String,
    pub floor_price_24h_percentage_change: String,
    pub h24_volume: String,
    pub h24_average_sale_price: String,
    pub chart_link: String,
    pub thumb_url: String,
}

#[derive(Deserialize)]
struct RawCoinEntry {
    item: RawCoinItem,
}

#[derive(Deserialize)]
struct RawCoinItem {
    id: String,
    name: String,
    symbol: String,
    // present but nullable
    #[serde(deserialize_with = "Option::deserialize")]
    market_cap_rank: Option<u32>,
    small: String,
    data: RawCoinData,
}

#[derive(Deserialize)]
struct RawCoinData {
    #[serde(deserialize_with = "verbatim")]
    market_cap_btc: String,
    #[serde(deserialize_with = "verbatim")]
    market_cap: String,
    #[serde(deserialize_with = "verbatim")]
    total_volume: String,
    #[serde(deserialize_with = "verbatim")]
    total_volume_btc: String,
    #[serde(default)]
    sparkline: Option<String>,
}

#[derive(Deserialize)]
struct RawNftEntry {
    #[serde(default)]
    id: Option<String>,
    name: String,
    symbol: String,
    #[serde(deserialize_with = "verbatim")]
    nft_contract_id: String,
    thumb: String,
    data: RawNftData,
}

#[derive(Deserialize)]
struct RawNftData {
    #[serde(deserialize_with = "verbatim")]
    floor_price: String,
    #[serde(deserialize_with = "verbatim")]
    floor_price_in_usd_24h_percentage_change: String,
    #[serde(deserialize_with = "verbatim")]
    h24_volume: String,
    #[serde(deserialize_with = "verbatim")]
    h24_average_sale_price: String,
    #[serde(default)]
    sparkline: Option<String>,
}

/// Keep a figure exactly as the API sent it: strings as-is, numbers as
/// their JSON text, null as "N/A".
fn verbatim<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => "N/A".to_string(),
        other => other.to_string(),
    })
}

/// Flatten raw trending coin entries, one record per entry, in order.
/// Fails on the first entry missing a required field.
pub fn normalize_coins(raw: &[Value]) -> Result<Vec<TrendingCoin>> {
    raw.iter()
        .enumerate()
        .map(|(index, entry)| -> Result<TrendingCoin> {
            let RawCoinEntry { item } = RawCoinEntry::deserialize(entry)
                .with_context(|| format!("Malformed trending coin entry #{}", index))?;
            let chart_link = item
                .data
                .sparkline
                .unwrap_or_else(|| format!("{}/{}", COIN_PAGE_URL, item.id));
            Ok(TrendingCoin {
                name: item.name,
                symbol: item.symbol,
                coin_id: item.id,
                market_cap_rank: item.market_cap_rank,
                market_cap_btc: item.data.market_cap_btc,
                market_cap: item.data.market_cap,
                total_volume: item.data.total_volume,
                total_volume_btc: item.data.total_volume_btc,
                chart_link,
                thumb_url: item.small,
            })
        })
        .collect()
}

/// Flatten raw trending NFT entries, one record per entry, in order.
/// Fails on the first entry missing a required field.
pub fn normalize_nfts(raw: &[Value]) -> Result<Vec<TrendingNft>> {
    raw.iter()
        .enumerate()
        .map(|(index, entry)| -> Result<TrendingNft> {
            let nft = RawNftEntry::deserialize(entry)
                .with_context(|| format!("Malformed trending NFT entry #{}", index))?;
            let chart_link = match (nft.data.sparkline, nft.id) {
                (Some(link), _) => link,
                (None, Some(id)) => format!("{}/{}", NFT_PAGE_URL, id),
                (None, None) => TRENDING_NFTS_URL.to_string(),
            };
            Ok(TrendingNft {
                name: nft.name,
                symbol: nft.symbol,
                nft_contract_id: nft.nft_contract_id,
                floor_price: nft.data.floor_price,
                floor_price_24h_percentage_change: nft
                    .data
                    .floor_price_in_usd_24h_percentage_change,
                h24_volume: nft.data.h24_volume,
                h24_average_sale_price: nft.data.h24_average_sale_price,
                chart_link,
                thumb_url: nft.thumb,
            })
        })
        .collect()
}
