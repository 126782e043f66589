pub mod capture;
pub mod inspect;
pub mod upgrade;
