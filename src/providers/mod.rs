pub mod base;
pub mod llama_server;
