use std::str::FromStr;

use clap::{
    Parser,
    Subcommand,
};
use color_eyre::eyre::Error;
use navprot::{
    convert::to_egts,
    egts,
    ndtp::{
        self,
        PacketKind,
    },
};

fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match args.command {
        Command::Ndtp { data } => {
            let mut buffer = data.0;
            while !buffer.is_empty() {
                let decoded = ndtp::Packet::decode(&buffer)?;
                println!("{}", decoded.packet);
                buffer = decoded.rest.to_vec();
            }
        }
        Command::Egts { data } => {
            let mut buffer = data.0;
            while !buffer.is_empty() {
                let decoded = egts::Packet::decode(&buffer)?;
                println!("{}", decoded.packet);
                buffer = decoded.rest.to_vec();
            }
        }
        Command::NdtpToEgts {
            data,
            object_id,
            packet_id,
            record_number,
        } => {
            let decoded = ndtp::Packet::decode(&data.0)?;
            let packet = to_egts(&decoded.packet, object_id, packet_id, record_number)?;
            println!("{packet}");
            println!("{}", hex::encode(packet.encode()?));
        }
        Command::Reply { data, result } => {
            let decoded = ndtp::Packet::decode(&data.0)?;
            let reply = if decoded.packet.packet_kind() == Some(PacketKind::DeviceTitleData) {
                decoded.packet.reply_ext(result)?
            }
            else {
                decoded.packet.reply(result)?
            };
            println!("{}", hex::encode(reply));
        }
    }

    Ok(())
}

#[derive(Debug, Parser)]
pub struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decodes and prints all NDTP frames in a buffer.
    Ndtp { data: HexBytes },

    /// Decodes and prints all EGTS packets in a buffer.
    Egts { data: HexBytes },

    /// Converts an NDTP navigation frame into an EGTS packet.
    NdtpToEgts {
        data: HexBytes,

        #[clap(long, env = "EGTS_OBJECT_ID", default_value = "0")]
        object_id: u32,

        #[clap(long, default_value = "0")]
        packet_id: u16,

        #[clap(long, default_value = "0")]
        record_number: u16,
    },

    /// Prints the reply a server sends for an NDTP frame.
    Reply {
        data: HexBytes,

        #[clap(long, default_value = "0")]
        result: u32,
    },
}

#[derive(Clone, Debug)]
pub struct HexBytes(Vec<u8>);

impl FromStr for HexBytes {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        Ok(Self(hex::decode(s)?))
    }
}
