//! Serial receive task
//!
//! Assembles newline-terminated command lines and hands decoded commands to
//! the controller.

use defmt::*;
use embassy_rp::uart::BufferedUartRx;
use embedded_io_async::Read;

use conveyor_protocol::{parse, LineAssembler, LineError};

use crate::channels::COMMAND_CHANNEL;

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 64;

/// Serial RX task - receives and decodes command lines
#[embassy_executor::task]
pub async fn serial_rx_task(mut rx: BufferedUartRx) {
    info!("Serial RX task started");

    let mut lines = LineAssembler::new();
    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        match rx.read(&mut buf).await {
            Ok(n) if n > 0 => {
                trace!("RX: {} bytes", n);

                for &byte in &buf[..n] {
                    match lines.feed(byte) {
                        Ok(Some(line)) => {
                            let command = parse(&line);
                            debug!("Command: {}", line.as_str());
                            // Controller reports unknown commands itself
                            COMMAND_CHANNEL.send(command).await;
                        }
                        Ok(None) => {}
                        Err(LineError::Overflow) => {
                            warn!("Command line too long, discarding");
                        }
                        Err(LineError::InvalidUtf8) => {
                            warn!("Command line is not valid UTF-8, discarding");
                        }
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("UART read error: {:?}", e);
            }
        }
    }
}
