//! Repository implementations using SeaORM

pub mod genre_limit_repository;
pub mod item_repository;
pub mod loan_repository;
pub mod patron_repository;
pub mod settings_repository;

pub use genre_limit_repository::SeaOrmGenreLimitStore;
pub use item_repository::{
    sea_orm_catalog, SeaOrmBookRepository, SeaOrmDiscRepository, SeaOrmFilmRepository,
    SeaOrmGameRepository,
};
pub use loan_repository::SeaOrmLoanGateway;
pub use patron_repository::SeaOrmPatronRepository;
pub use settings_repository::SeaOrmParameterStore;
