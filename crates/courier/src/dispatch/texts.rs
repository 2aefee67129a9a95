//! Static informational replies for local commands.

pub const BOT_NAME: &str = "Courier";

pub fn welcome() -> String {
    format!(
        "{BOT_NAME} v{}\n\n\
         I route your commands to the operational backends and answer\n\
         free-form questions with the assistant.\n\n\
         Type /help for the command list.",
        env!("CARGO_PKG_VERSION")
    )
}

pub fn help() -> String {
    format!(
        "{BOT_NAME} — commands\n\n\
         Project management:\n\
         /tasks — task board status\n\
         /orders [status] — order count, optionally filtered\n\
         /deploy [phase] — deployment actions\n\n\
         Assistant:\n\
         /nova <message> — ask the assistant\n\
         /confirm — confirm a pending sensitive action\n\
         /cancel — cancel a pending sensitive action\n\n\
         Licenses:\n\
         /license <key> — validate a license key\n\
         /validar <clave> — alias for /license\n\
         /mylicenses — your recent validations\n\
         /registrar <email> — link your email\n\n\
         Resources:\n\
         /commandcenter /dashboard /miniapps /tools /terminal\n\n\
         System:\n\
         /status — dispatcher status\n\
         /stats — usage statistics\n\
         /ping — probe backends\n\
         /menu — show this bot's surface"
    )
}

pub fn status() -> String {
    format!(
        "{BOT_NAME} v{} — online\n\nAll replies are generated per message; \
         use /ping to probe the backends.",
        env!("CARGO_PKG_VERSION")
    )
}

pub fn menu() -> String {
    "Main commands: /tasks /orders /deploy /nova /license /stats /help".into()
}

pub fn licenses_help() -> String {
    "License commands:\n\
     /license <key> — validate a key\n\
     /validar <clave> — alias\n\
     /mylicenses — your recent validations"
        .into()
}

pub const NOVA_USAGE: &str =
    "Usage: /nova <your message>\nExample: /nova summarize this week's deployments";

pub const LICENSE_USAGE: &str = "Usage: /license <KEY>\nExample: /license STL-A3F2-8B1C-D4E5";

pub const REGISTER_USAGE: &str = "Usage: /registrar you@example.com";
