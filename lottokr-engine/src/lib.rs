pub mod backtest;
pub mod cache;
pub mod cdm;
pub mod config;
pub mod consensus;
pub mod display;
pub mod error;
pub mod formulas;
pub mod matching;
pub mod patterns;
pub mod recommend;
pub mod sampler;
pub mod stats;
