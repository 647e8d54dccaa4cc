//! Access-point scanning.
//!
//! Lists nearby networks through a [`WifiAdapter`] and prints them to the
//! console, capped at [`MAX_SCAN_RESULTS`].

use alloc::vec;
use core::fmt::{self, Write};

use defmt::{info, warn};

use crate::adapter::WifiAdapter;
use crate::types::AccessPointRecord;

/// Most networks ever listed, however many are visible
pub const MAX_SCAN_RESULTS: usize = 15;

/// Scan once and print up to `max_results` networks.
///
/// The adapter is first asked how many networks it sees; the count is
/// clamped, a buffer of exactly that many records is allocated and filled,
/// and every filled record is printed followed by the total. Scan failures
/// are not reported to the caller: they show up as zero networks.
///
/// Returns the number of networks printed.
///
/// # Errors
///
/// Only console write failures are returned.
pub async fn scan_networks<A, W>(
    adapter: &mut A,
    console: &mut W,
    max_results: usize,
) -> Result<usize, fmt::Error>
where
    A: WifiAdapter,
    W: Write,
{
    let visible = adapter
        .probe_count()
        .await
        .inspect_err(|e| warn!("Scan probe failed: {}", e))
        .ok();
    let available = visible.unwrap_or(0);
    let wanted = available.min(max_results).min(MAX_SCAN_RESULTS);
    info!("{} networks visible, listing {}", available, wanted);

    let mut records = vec![AccessPointRecord::default(); wanted];
    let count = match visible {
        // Fill runs even with an empty buffer so the adapter drops cached
        // results
        Some(_) => adapter
            .fill(&mut records)
            .await
            .unwrap_or_else(|e| {
                warn!("Scan fill failed: {}", e);
                0
            })
            .min(records.len()),
        None => 0,
    };

    for ap in &records[..count] {
        writeln!(console, "{ap}")?;
    }
    writeln!(console, "{count} networks available.")?;

    Ok(count)
}
