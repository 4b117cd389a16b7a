//! Fixtures shared by repository and service tests

use chrono::Utc;

use crate::db::{create_test_pool, migrations, DynDatabasePool};
use crate::models::{
    Curriculum, Email, Title, User, UserName, UserRole, Visibility, WeekSchedule,
};

use super::{CurriculumRepository, SqlxCurriculumRepository, SqlxUserRepository, UserRepository};

pub async fn setup_pool() -> DynDatabasePool {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

pub fn user(name: &str) -> User {
    User::new(
        UserName::parse(name).expect("valid name"),
        Email::parse(&format!("{}@example.com", name.to_lowercase().replace(' ', "")))
            .expect("valid email"),
        "not-a-real-hash".to_string(),
    )
}

pub async fn insert_user(pool: &DynDatabasePool, name: &str) -> User {
    let repo = SqlxUserRepository::new(pool.clone());
    repo.create(&user(name)).await.expect("Failed to insert user")
}

pub async fn insert_admin(pool: &DynDatabasePool, name: &str) -> User {
    let mut admin = user(name);
    admin.role = UserRole::Admin;
    let repo = SqlxUserRepository::new(pool.clone());
    repo.create(&admin).await.expect("Failed to insert admin")
}

pub fn curriculum(owner: &User, title: &str, visibility: Visibility, weeks: i64) -> Curriculum {
    let weeks = (1..=weeks)
        .map(|n| {
            WeekSchedule::new(n, None, vec![format!("lesson {}-a", n), format!("lesson {}-b", n)])
                .expect("valid week")
        })
        .collect();
    let mut c = Curriculum::new(&owner.id, Title::parse(title).expect("valid title"), visibility, weeks)
        .expect("valid curriculum");
    c.updated_at = Utc::now();
    c
}

pub async fn insert_curriculum(
    pool: &DynDatabasePool,
    owner: &User,
    title: &str,
    visibility: Visibility,
    weeks: i64,
) -> Curriculum {
    let c = curriculum(owner, title, visibility, weeks);
    SqlxCurriculumRepository::new(pool.clone())
        .create(&c)
        .await
        .expect("Failed to insert curriculum");
    c
}
