mod accounts;
mod cars;

pub use accounts::AccountService;
pub use cars::CarsService;
