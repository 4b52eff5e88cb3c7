use apdu_lib::{Command, CommandHeader, Exchange, ExchangeConfig, ReplayTransport};
use bytes::Bytes;
use tracing_subscriber::EnvFilter;

/// Run a U2F register request against a scripted authenticator that answers
/// in three frames, and print what went over the wire.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .without_time()
        .init();

    let mut challenge = vec![0x41; 32];
    challenge.extend(std::iter::repeat_n(0x42, 32));
    let command = Command::new(CommandHeader::new(0x00, 0x01, 0x03, 0x00))
        .with_data(challenge)
        .with_expected_len(0);

    let script = ["05040102036108", "0405060708090a0b6102", "0c0d9000"]
        .into_iter()
        .map(|frame| hex::decode(frame).map(Bytes::from))
        .collect::<Result<Vec<_>, _>>()?;

    let config = ExchangeConfig {
        get_response_cla: Some(0x00),
        ..ExchangeConfig::default()
    };
    let mut exchange = Exchange::with_config(ReplayTransport::new(script), config);

    println!("Command: {}", command);
    let response = exchange.transmit(&command).await?;

    for (i, frame) in exchange.transport().sent().iter().enumerate() {
        println!("  > [{}] {}", i, hex::encode(frame));
    }
    println!("Response: {}", response);
    Ok(())
}
