use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};

// Smoke-test client: connects, starts a maze if it wins the lead election,
// then reports player positions and prints the state ticks it gets back.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:5000".to_string());

    println!("Connecting to {}", url);
    let (ws_stream, _) = connect_async(&url).await?;
    let (mut write, mut read) = ws_stream.split();

    // First message is always the handshake.
    let frame = read.next().await.ok_or("server closed before handshake")??;
    let handshake: serde_json::Value = serde_json::from_str(frame.to_text()?)?;
    println!(
        "Connected as {} (lead: {}, started: {})",
        handshake["connected"], handshake["isLead"], handshake["started"]
    );

    let is_lead = handshake["isLead"].as_bool().unwrap_or(false);
    let started = handshake["started"].as_bool().unwrap_or(false);
    if is_lead && !started {
        println!("Lead election won, starting a 6x4 maze");
        let start = json!({
            "start": {
                "world": "maze",
                "maze": { "width": 6, "height": 4 }
            }
        });
        write.send(Message::Text(start.to_string())).await?;
    }

    // Report a slowly circling position and print whatever comes back.
    for i in 0..10 {
        let angle = i as f64 / 5.0;
        let update = json!({
            "player": {
                "playerName": "smoke-test",
                "position": { "x": angle.sin(), "y": 0.0, "z": angle.cos() },
                "velocity": { "x": 0.0, "y": 0.0, "z": 0.0 },
                "orientation": { "x": 0.0, "y": angle, "z": 0.0 },
                "direction": { "x": angle.cos(), "y": 0.0, "z": -angle.sin() },
                "shots": []
            }
        });
        write.send(Message::Text(update.to_string())).await?;

        while let Ok(Some(frame)) = timeout(Duration::from_millis(200), read.next()).await {
            let message: serde_json::Value = serde_json::from_str(frame?.to_text()?)?;
            if let Some(state) = message.get("state") {
                let players = state.as_object().map(|map| map.len()).unwrap_or(0);
                println!("state tick: {} player(s)", players);
                break;
            }
            if message.get("started").is_some() {
                println!("session started in world {}", message["world"]);
            }
        }

        sleep(Duration::from_millis(300)).await;
    }

    write.send(Message::Close(None)).await?;
    println!("Test client finished");
    Ok(())
}
