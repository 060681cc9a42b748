pub mod sales;

pub use sales::SaleService;
