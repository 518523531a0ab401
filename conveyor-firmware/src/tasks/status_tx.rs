//! Serial transmit task
//!
//! Writes each status event as one text line.

use defmt::*;
use embassy_rp::uart::BufferedUartTx;
use embedded_io_async::Write;

use crate::channels::STATUS_CHANNEL;

/// Status TX task - renders status events onto the serial link
#[embassy_executor::task]
pub async fn status_tx_task(mut tx: BufferedUartTx) {
    info!("Status TX task started");

    loop {
        let event = STATUS_CHANNEL.receive().await;
        let line = event.to_line();

        if event.is_rejection() || event.is_timeout() {
            warn!("{}", line.as_str());
        } else {
            info!("{}", line.as_str());
        }

        if let Err(e) = tx.write_all(line.as_bytes()).await {
            warn!("Failed to send status: {:?}", e);
            continue;
        }
        if let Err(e) = tx.write_all(b"\r\n").await {
            warn!("Failed to send status: {:?}", e);
        }
    }
}
