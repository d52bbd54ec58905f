pub mod chatbot;
pub mod genetics;
pub mod health;
pub mod pages;
