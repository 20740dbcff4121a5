use std::fmt::Write as _;

use serde_json::{json, Value};

use house_wallet_core::{
    format_for_display, format_usd, short_address, ChainRegistry, PriceSnapshot, PriceSource,
    TransferReceipt, ValuedBalanceSheet,
};

pub fn chains(registry: &ChainRegistry) -> String {
    let mut out = String::new();
    let default = registry.default_chain_id();
    for chain in registry.chains() {
        let symbols: Vec<&str> = registry
            .tokens_for(chain.chain_id)
            .map(|tokens| tokens.iter().map(|t| t.symbol.as_str()).collect())
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{marker} {id:>9}  {name:<18} {tokens}{testnet}",
            marker = if chain.chain_id == default { "*" } else { " " },
            id = chain.chain_id,
            name = chain.name,
            tokens = symbols.join(", "),
            testnet = if chain.testnet { "  (testnet)" } else { "" },
        );
    }
    out
}

pub fn chains_json(registry: &ChainRegistry) -> Value {
    json!(registry.document())
}

pub fn prices(snapshot: &PriceSnapshot, symbols: &[String]) -> String {
    let mut out = String::new();
    for symbol in symbols {
        match snapshot.quote(symbol) {
            Some(q) => {
                let _ = writeln!(
                    out,
                    "{symbol:<8} {usd:>14} {change:>+8.2}%",
                    usd = format_usd(q.usd),
                    change = q.change_24h,
                );
            }
            None => {
                let _ = writeln!(out, "{symbol:<8} {:>14}", "n/a");
            }
        }
    }
    if let Some(note) = source_note(snapshot.source, snapshot.stale) {
        let _ = writeln!(out, "{note}");
    }
    out
}

pub fn prices_json(snapshot: &PriceSnapshot) -> Value {
    json!({
        "quotes": snapshot.quotes,
        "source": snapshot.source,
        "stale": snapshot.stale,
        "warning": snapshot.degraded.as_ref().map(ToString::to_string),
    })
}

pub fn sheet(sheet: &ValuedBalanceSheet, registry: &ChainRegistry) -> String {
    let chain = registry
        .describe_chain(sheet.chain_id)
        .map(|c| c.name.as_str())
        .unwrap_or("unknown");
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} on {chain} (generation {})",
        short_address(&sheet.address.to_string()),
        sheet.generation
    );
    for entry in &sheet.entries {
        let value = if entry.price_unavailable {
            "price n/a".to_owned()
        } else {
            format_usd(entry.usd_value)
        };
        let _ = writeln!(
            out,
            "  {symbol:<8} {balance:>16} {value:>14}",
            symbol = entry.symbol,
            balance = format_for_display(&entry.balance, 4),
        );
        if let Some(warning) = &entry.warning {
            let _ = writeln!(out, "           ! {warning}");
        }
    }
    let _ = writeln!(out, "  {:<8} {:>31}", "total", format_usd(sheet.total_usd));
    if let Some(note) = source_note(sheet.price_source, sheet.prices_stale) {
        let _ = writeln!(out, "{note}");
    }
    out
}

pub fn receipt(receipt: &TransferReceipt) -> String {
    format!("submitted {}\n{}\n", receipt.tx_hash, receipt.explorer_url)
}

fn source_note(source: PriceSource, stale: bool) -> Option<&'static str> {
    match source {
        PriceSource::Live if !stale => None,
        PriceSource::Live | PriceSource::Cached => Some("prices may be outdated"),
        PriceSource::Fallback => Some("showing placeholder prices"),
        PriceSource::Unavailable => Some("prices unavailable"),
    }
}
