use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    middleware::auth::Claims,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;
    let pool = create_pool(&config.database_url).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin").await?;
    let customer_id = ensure_user(&pool, "customer@example.com", "customer").await?;
    seed_products(&pool).await?;
    seed_discounts(&pool).await?;

    // Local bearer tokens; real ones come from the auth provider.
    let secret = config.jwt_secret.expose_secret().as_bytes();
    println!("Seed completed.");
    println!("admin    {admin_id}\n  Bearer {}", dev_token(admin_id, "admin", secret)?);
    println!(
        "customer {customer_id}\n  Bearer {}",
        dev_token(customer_id, "customer", secret)?
    );
    Ok(())
}

fn dev_token(user_id: Uuid, role: &str, secret: &[u8]) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: (Utc::now() + Duration::days(7)).timestamp() as usize,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )?)
}

async fn ensure_user(pool: &sqlx::PgPool, email: &str, role: &str) -> anyhow::Result<Uuid> {
    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, role)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = [
        ("Linen Shirt", "Breathable summer shirt", Decimal::new(4500, 2), "shirts/linen.jpg"),
        ("Canvas Tote", "Everyday carry-all", Decimal::new(1999, 2), "bags/tote.jpg"),
        ("Wool Throw", "Heavy knit blanket", Decimal::new(12000, 2), "home/throw.jpg"),
        ("Ceramic Mug", "Stoneware, 350 ml", Decimal::new(1200, 2), "home/mug.jpg"),
    ];

    for (name, desc, price, image_ref) in products {
        sqlx::query(
            r#"
            INSERT INTO products (name, description, price, image_ref)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(image_ref)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_discounts(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let now = Utc::now();
    let discounts = [
        ("WELCOME10", "percentage", Decimal::from(10), None, None),
        ("FLAT5", "fixed", Decimal::from(5), Some(100), None),
        (
            "EXPIRED10",
            "percentage",
            Decimal::from(10),
            None,
            Some(now - Duration::days(1)),
        ),
    ];

    for (code, kind, value, max_uses, expires_at) in discounts {
        sqlx::query(
            r#"
            INSERT INTO discount_codes (id, code, kind, value, max_uses, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(code)
        .bind(kind)
        .bind(value)
        .bind(max_uses)
        .bind(expires_at)
        .execute(pool)
        .await?;
    }

    println!("Seeded discount codes");
    Ok(())
}
