pub mod answer;
pub mod conversation;
pub mod env;
pub mod error;
pub mod html;
pub mod keywords;
pub mod normalize;
pub mod openai;
pub mod prompt;
pub mod rate_limit;
pub mod score;
pub mod sections;
