//! Deterministic demo dataset for local development and the `seed` CLI
//! command. Loading is idempotent: rows are keyed by fixed ids and existing
//! rows are left untouched.

use chrono::Utc;
use panaderia_core::auth;

use crate::repositories::RepositoryError;
use crate::DbPool;

struct SeedProduct {
    id: i64,
    name: &'static str,
    description: &'static str,
    price: f64,
    category: &'static str,
    stock: i64,
    image: Option<&'static str>,
}

struct SeedUser {
    id: i64,
    first_name: &'static str,
    last_name: &'static str,
    email: &'static str,
    phone: &'static str,
    password: &'static str,
    role: &'static str,
}

const SEED_PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        id: 1,
        name: "Concha de vainilla",
        description: "Pan dulce tradicional con costra de vainilla",
        price: 12.50,
        category: "pan-dulce",
        stock: 40,
        image: Some("img/concha-vainilla.jpg"),
    },
    SeedProduct {
        id: 2,
        name: "Concha de chocolate",
        description: "Pan dulce tradicional con costra de chocolate",
        price: 12.50,
        category: "pan-dulce",
        stock: 40,
        image: Some("img/concha-chocolate.jpg"),
    },
    SeedProduct {
        id: 3,
        name: "Bolillo",
        description: "Pan blanco crujiente, horneado dos veces al dia",
        price: 4.00,
        category: "pan-salado",
        stock: 120,
        image: Some("img/bolillo.jpg"),
    },
    SeedProduct {
        id: 4,
        name: "Rosca de canela",
        description: "Rosca hojaldrada con azucar y canela",
        price: 18.00,
        category: "pan-dulce",
        stock: 25,
        image: Some("img/rosca-canela.jpg"),
    },
    SeedProduct {
        id: 5,
        name: "Pastel de chocolate",
        description: "Pastel de tres capas con betun de chocolate",
        price: 320.00,
        category: "pasteles",
        stock: 6,
        image: Some("img/pastel-chocolate.jpg"),
    },
    SeedProduct {
        id: 6,
        name: "Brownie con nuez",
        description: "Brownie humedo con nuez tostada",
        price: 28.00,
        category: "pasteles",
        stock: 30,
        image: Some("img/brownie-nuez.jpg"),
    },
    SeedProduct {
        id: 7,
        name: "Galleta de mantequilla",
        description: "Galleta clasica de mantequilla",
        price: 8.00,
        category: "galletas",
        stock: 80,
        image: Some("img/galleta-mantequilla.jpg"),
    },
    SeedProduct {
        id: 8,
        name: "Cuernito",
        description: "Cuernito de mantequilla estilo frances",
        price: 15.00,
        category: "pan-salado",
        stock: 35,
        image: Some("img/cuernito.jpg"),
    },
];

const SEED_USERS: &[SeedUser] = &[
    SeedUser {
        id: 1,
        first_name: "Alma",
        last_name: "Delgado",
        email: "alma@panaderia.local",
        phone: "5550000001",
        password: "migas-y-pan-1",
        role: "admin",
    },
    SeedUser {
        id: 2,
        first_name: "Rosa",
        last_name: "Miranda",
        email: "rosa@example.com",
        phone: "5550000002",
        password: "concha-doble-2",
        role: "customer",
    },
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub products_inserted: u64,
    pub users_inserted: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

pub struct DemoDataset;

impl DemoDataset {
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut products_inserted = 0;
        for product in SEED_PRODUCTS {
            let result = sqlx::query(
                "INSERT INTO products (id, name, description, price, category, stock, image)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(product.id)
            .bind(product.name)
            .bind(product.description)
            .bind(product.price)
            .bind(product.category)
            .bind(product.stock)
            .bind(product.image)
            .execute(pool)
            .await?;
            products_inserted += result.rows_affected();
        }

        let mut users_inserted = 0;
        for user in SEED_USERS {
            let password_hash = auth::hash_password(user.password)
                .map_err(|error| RepositoryError::Decode(error.to_string()))?;
            let result = sqlx::query(
                "INSERT INTO users
                    (id, first_name, last_name, email, phone, password_hash, role, registered_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(user.id)
            .bind(user.first_name)
            .bind(user.last_name)
            .bind(user.email)
            .bind(user.phone)
            .bind(&password_hash)
            .bind(user.role)
            .bind(Utc::now().to_rfc3339())
            .execute(pool)
            .await?;
            users_inserted += result.rows_affected();
        }

        Ok(SeedResult { products_inserted, users_inserted })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let product_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(pool)
            .await?;
        checks.push(("seed products present", product_count >= SEED_PRODUCTS.len() as i64));

        let admin_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
                .fetch_one(pool)
                .await?;
        checks.push(("admin account present", admin_count >= 1));

        let customer_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'customer'")
                .fetch_one(pool)
                .await?;
        checks.push(("customer account present", customer_count >= 1));

        let orphan_stock: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE stock < 0")
                .fetch_one(pool)
                .await?;
        checks.push(("no negative stock", orphan_stock == 0));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }
}
