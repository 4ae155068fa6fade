//! User record integration tests.
//!
//! Exercises the public API end to end over the in-memory repository:
//! - Registration, normalization and validation reports
//! - Email uniqueness under concurrent registration
//! - Password hashing only when the password changes
//! - Sign-in, suspension and deactivation
//!
//! Run with: `cargo test --test users_test`

mod helpers;

use std::sync::Arc;

use chrono::{Duration, Utc};
use learnhub_server::users::{
    hash_password, verify_password, FieldError, LearnerProfile, NewUser, PasswordHasher,
    ProfileUpdate, Theme, UserError, UserType,
};
use uuid::Uuid;

use helpers::{new_user, register, service};

// ============================================================================
// Password Hashing Tests
// ============================================================================

#[test]
fn test_password_hash_and_verify_success() {
    let password = "secure_password_123!";
    let hash = hash_password(password).expect("Hashing should succeed");

    assert_ne!(hash, password);
    assert!(hash.starts_with("$argon2id$"));
    assert!(verify_password(password, &hash).expect("Verification should succeed"));
    assert!(!verify_password("wrong_password", &hash).expect("Verification should succeed"));
}

#[test]
fn test_password_hash_produces_unique_hashes() {
    let hash1 = hash_password("same_password").unwrap();
    let hash2 = hash_password("same_password").unwrap();

    assert_ne!(hash1, hash2, "Argon2 should salt every hash");
}

#[test]
fn test_verify_rejects_malformed_hash() {
    assert!(verify_password("anything", "not-a-phc-string").is_err());
}

#[tokio::test]
async fn test_async_hasher_round_trip() {
    let svc = service();
    let user = register(&svc, "hasher@example.com", "admin").await;

    let creds = svc
        .repository()
        .stored_password_hash(user.id)
        .await
        .expect("hash stored");
    assert!(creds.starts_with("$argon2id$"));

    let hasher = learnhub_server::users::Argon2Hasher::new(1024, 1, 1).unwrap();
    assert!(hasher.verify("secret1", &creds).await.unwrap());
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_learner() {
    let svc = service();

    let user = svc
        .register(
            new_user(" Ada ", "Lovelace", "  Ada@Example.COM ", "learner"),
            Some("203.0.113.7".into()),
        )
        .await
        .unwrap();

    assert_eq!(user.first_name, "Ada");
    assert_eq!(user.email, "ada@example.com");
    assert_eq!(user.full_name(), "Ada Lovelace");
    assert_eq!(user.user_type(), UserType::Learner);
    assert_eq!(user.learner_profile(), Some(&LearnerProfile::default()));
    assert!(user.status.is_active);
    assert!(!user.status.is_email_verified);
    assert_eq!(user.preferences.theme, Theme::Light);

    let json = serde_json::to_value(&user).unwrap();
    assert_eq!(json["userType"], "learner");
    assert_eq!(json["email"], "ada@example.com");
    assert!(json.get("password").is_none());
    assert!(json.get("fullName").is_none());
}

#[tokio::test]
async fn test_register_reports_every_problem() {
    let svc = service();
    let input = NewUser {
        first_name: Some("   ".into()),
        email: Some("not-an-email".into()),
        password: Some("123".into()),
        user_type: Some("guest".into()),
        ..Default::default()
    };

    let err = svc.register(input, None).await.unwrap_err();
    let UserError::Invalid(report) = err else {
        panic!("expected validation report, got {err:?}");
    };

    assert!(matches!(
        report.get("firstName"),
        Some(FieldError::MissingField { .. })
    ));
    assert!(matches!(
        report.get("lastName"),
        Some(FieldError::MissingField { .. })
    ));
    assert!(matches!(
        report.get("email"),
        Some(FieldError::Validation { .. })
    ));
    assert!(matches!(
        report.get("password"),
        Some(FieldError::Validation { .. })
    ));
    assert_eq!(
        report.get("userType").map(ToString::to_string),
        Some("userType must be one of: learner, instructor, admin".to_string())
    );
}

#[tokio::test]
async fn test_register_from_json_payload() {
    let svc = service();
    let payload = serde_json::json!({
        "firstName": "Grace",
        "lastName": "Hopper",
        "email": "Grace@Navy.mil",
        "password": "cobol59",
        "userType": "instructor",
        "instructorProfile": { "bio": "Compilers", "expertise": [" COBOL "] },
        "preferences": { "theme": "dark" }
    });
    let input: NewUser = serde_json::from_value(payload).unwrap();

    let user = svc.register(input, None).await.unwrap();

    let profile = user.instructor_profile().expect("instructor profile");
    assert_eq!(profile.bio.as_deref(), Some("Compilers"));
    assert_eq!(profile.expertise, vec!["COBOL".to_string()]);
    assert_eq!(user.preferences.theme, Theme::Dark);
}

#[tokio::test]
async fn test_concurrent_registration_single_winner() {
    let svc = Arc::new(service());

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move {
                let email = if i % 2 == 0 {
                    "race@example.com"
                } else {
                    "RACE@example.com"
                };
                svc.register(new_user("Racer", "X", email, "learner"), None)
                    .await
            })
        })
        .collect();

    let mut winners = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(UserError::DuplicateKey { field: "email" }) => duplicates += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(duplicates, 5);
}

// ============================================================================
// Updates
// ============================================================================

#[tokio::test]
async fn test_update_without_password_keeps_hash() {
    let svc = service();
    let user = register(&svc, "keep@example.com", "learner").await;
    let before = svc.repository().stored_password_hash(user.id).await;

    let update = ProfileUpdate {
        first_name: Some("Kept".into()),
        ..Default::default()
    };
    svc.update_profile(user.id, update).await.unwrap();

    assert_eq!(svc.repository().stored_password_hash(user.id).await, before);
}

#[tokio::test]
async fn test_password_change_rehashes() {
    let svc = service();
    let user = register(&svc, "rotate@example.com", "learner").await;

    svc.change_password(user.id, "another-secret".into())
        .await
        .unwrap();

    let hash = svc.repository().stored_password_hash(user.id).await.unwrap();
    assert_ne!(hash, "another-secret");
    assert!(verify_password("another-secret", &hash).unwrap());
    assert!(svc.authenticate("rotate@example.com", "secret1").await.is_err());
    svc.authenticate("rotate@example.com", "another-secret")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_to_taken_email() {
    let svc = service();
    register(&svc, "taken@example.com", "learner").await;
    let other = register(&svc, "other@example.com", "learner").await;

    let update = ProfileUpdate {
        email: Some(" TAKEN@example.com".into()),
        ..Default::default()
    };
    let result = svc.update_profile(other.id, update).await;

    assert!(matches!(
        result,
        Err(UserError::DuplicateKey { field: "email" })
    ));
    let unchanged = svc.find_by_id(other.id).await.unwrap().unwrap();
    assert_eq!(unchanged.email, "other@example.com");
}

// ============================================================================
// Sign-in
// ============================================================================

#[tokio::test]
async fn test_sign_in_lifecycle() {
    let svc = service();
    let user = register(&svc, "life@example.com", "instructor").await;

    let signed_in = svc.authenticate("Life@Example.com", "secret1").await.unwrap();
    assert_eq!(signed_in.status.login_count, 1);

    svc.suspend(user.id, Utc::now() + Duration::hours(1), None)
        .await
        .unwrap();
    assert!(matches!(
        svc.authenticate("life@example.com", "secret1").await,
        Err(UserError::AccountDisabled)
    ));

    // An expired suspension no longer blocks sign-in.
    svc.suspend(user.id, Utc::now() - Duration::hours(1), None)
        .await
        .unwrap();
    let signed_in = svc.authenticate("life@example.com", "secret1").await.unwrap();
    assert_eq!(signed_in.status.login_count, 2);
}

// ============================================================================
// Course activity
// ============================================================================

#[tokio::test]
async fn test_instructor_course_flow() {
    let svc = service();
    let user = register(&svc, "teach@example.com", "instructor").await;
    let course = Uuid::now_v7();

    let err = svc.publish_course(user.id, course).await.unwrap_err();
    assert!(matches!(err, UserError::Invalid(_)));

    svc.add_created_course(user.id, course).await.unwrap();
    let updated = svc.publish_course(user.id, course).await.unwrap();

    let profile = updated.instructor_profile().unwrap();
    assert_eq!(profile.total_courses, 1);
    assert_eq!(profile.published_courses, vec![course]);
}

#[tokio::test]
async fn test_census_by_role() {
    let svc = service();
    register(&svc, "a@example.com", "learner").await;
    register(&svc, "b@example.com", "learner").await;
    register(&svc, "c@example.com", "instructor").await;

    assert_eq!(
        svc.census().await.unwrap(),
        vec![(UserType::Learner, 2), (UserType::Instructor, 1)]
    );
    assert_eq!(svc.list_by_type(UserType::Learner).await.unwrap().len(), 2);
}
