use clap::Parser;
use common::{DEFAULT_BOARD_SIZE, MAX_BOARD_SIZE, MIN_BOARD_SIZE};
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "stackfour-server", about = "Real-time server for two-player stack four games")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "STACKFOUR_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    #[arg(long, env = "STACKFOUR_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Side length of the board for newly created games
    #[arg(long, env = "STACKFOUR_BOARD_SIZE", default_value_t = DEFAULT_BOARD_SIZE, value_parser = parse_board_size)]
    pub board_size: usize,

    /// Directory for the daily rolling JSON log
    #[arg(long, env = "STACKFOUR_LOG_DIR", default_value = "./logs")]
    pub log_dir: PathBuf,

    #[arg(long, env = "STACKFOUR_LOG_FILE", default_value = "server.log")]
    pub log_file: String,
}

impl Config {
    pub fn ws_url(&self, game_id: u64) -> String {
        format!("ws://{}:{}/ws/{}", self.host, self.port, game_id)
    }
}

fn parse_board_size(s: &str) -> Result<usize, String> {
    let size: usize = s.parse().map_err(|_| format!("{} is not a number", s))?;
    if !(MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&size) {
        return Err(format!(
            "board size must be between {} and {}",
            MIN_BOARD_SIZE, MAX_BOARD_SIZE
        ));
    }
    Ok(size)
}
