pub mod audit;
pub mod badge;
pub mod cms;
pub mod contact;
pub mod report;
pub mod user;
