/// Log tags identifying the emitting module
///
/// The debug key doubles as the `--debug-<key>` flag name.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Webhook,
    Swap,
    Enrich,
    Engine,
    Snipe,
    Rpc,
    Db,
    Telegram,
    Discord,
    Price,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Webhook => "WEBHOOK",
            LogTag::Swap => "SWAP",
            LogTag::Enrich => "ENRICH",
            LogTag::Engine => "ENGINE",
            LogTag::Snipe => "SNIPE",
            LogTag::Rpc => "RPC",
            LogTag::Db => "DB",
            LogTag::Telegram => "TELEGRAM",
            LogTag::Discord => "DISCORD",
            LogTag::Price => "PRICE",
        }
    }

    /// Flag suffix for --debug-<key>
    pub fn to_debug_key(&self) -> String {
        self.as_str().to_lowercase()
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
