use rcworker_shared::codec::{self, Envelope};
use rcworker_shared::{worker, CommandRequest, EchoCommand};
use std::collections::BTreeMap;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let host = std::env::var("RCWORKER_MESSAGING_HOST")
        .unwrap_or_else(|_| worker::DEFAULT_LISTEN_ADDR.to_string());

    let mut parameters = BTreeMap::new();
    parameters.insert("commands".to_string(), vec!["uname -a".to_string()]);

    let request = CommandRequest {
        instance_ids: vec!["i-0a1b2c3d".to_string()],
        document: Some("RunShellScript".to_string()),
        parameters,
        target_platform: Some("Linux".to_string()),
    };
    let echo = EchoCommand {
        name: "ping".to_string(),
        args: host.clone(),
    };

    println!("Sending messages to {}. To exit press CTRL+C", host);

    loop {
        match TcpStream::connect(&host).await {
            Ok(mut socket) => {
                let run = Envelope::with_json(worker::EXCHANGE, worker::RUN_COMMAND_ROUTING_KEY, &request)?;
                let ping = Envelope::with_json(worker::EXCHANGE, worker::ECHO_ROUTING_KEY, &echo)?;

                socket.write_all(&codec::encode(&run)?).await?;
                socket.write_all(&codec::encode(&ping)?).await?;
                socket.shutdown().await?;

                println!("Message sent: {}", run.body.as_deref().unwrap_or_default());
            }
            Err(e) => {
                eprintln!("Failed to connect to {}: {}", host, e);
            }
        }

        sleep(Duration::from_secs(5)).await;
    }
}
