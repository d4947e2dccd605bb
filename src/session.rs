/// Cookie-session key holding the signed session token of a browser client.
pub const TOKEN: &str = "token";
