extern crate tokio;

use std::error::Error;
use std::net::SocketAddr;
use std::time::Duration;
use dns::{DomainName, RecordType};
use log::{info, warn};
use tokio::net::UdpSocket;

const TIMEOUT: Duration = Duration::from_secs(3);

// mock_client [forwarder address] [domain]
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = env_logger::try_init();

    let forwarder_address = std::env::args().nth(1).unwrap_or("127.0.0.1:2053".to_string());
    let addr = forwarder_address.parse::<SocketAddr>()?;
    let domain = std::env::args().nth(2).unwrap_or("example.com".to_string());
    let name = domain.parse::<DomainName>()?;

    // 1. sends an A query with a process specific id
    let id = (std::process::id() & 0xFFFF) as u16;
    let request = dns::encode_query(id, name, RecordType::A)?;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.send_to(&request, addr).await?;
    info!("sent query {} for {} to {}", id, domain, addr);

    // 2. waits for the answer
    let mut buf = vec![0; 4096];
    let (n, from) = match tokio::time::timeout(TIMEOUT, socket.recv_from(&mut buf)).await {
        Ok(received) => received?,
        Err(_) => {
            warn!("no answer within {:?}", TIMEOUT);
            return Ok(());
        }
    };

    let response = dns::decode(&buf[0..n])?;
    if response.id != id {
        warn!("answer from {} carries id {}, expected {}", from, response.id, id);
    }

    println!("{} answers, rcode {:?}", response.answers.len(), response.flags.response_code);
    for record in &response.answers {
        match record.ipv4() {
            Some(address) => println!("{}\t{}\t{}\t{}", record.name, record.ttl, record.rtype, address),
            None => println!("{}\t{}\t{}\t{:?}", record.name, record.ttl, record.rtype, record.rdata),
        }
    }

    Ok(())
}
