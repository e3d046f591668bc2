pub mod mass_portfolio;
pub mod mssql;
