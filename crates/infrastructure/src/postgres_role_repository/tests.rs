use ecclesia_application::{
    CreateRoleInput, RoleRepository, RoleResolution, RoleResolutionRepository, UpdateRoleInput,
};
use ecclesia_core::{AppError, RoleId, UserId};
use ecclesia_domain::{Permission, RoleName};

use super::PostgresRoleRepository;
use crate::postgres_test_support::{insert_user, test_pool, unique_suffix};

fn role_input(name: &str, permissions: Vec<Permission>) -> CreateRoleInput {
    CreateRoleInput {
        name: RoleName::new(name).unwrap_or_else(|error| panic!("invalid role name: {error}")),
        description: "Test role".to_owned(),
        permissions,
        is_system: false,
    }
}

#[tokio::test]
async fn role_documents_keep_permission_order_and_reject_duplicates() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresRoleRepository::new(pool);
    let name = format!("choir_{}", unique_suffix());

    let created = repository
        .create_role(role_input(
            name.as_str(),
            vec![Permission::ManageLivestreams, Permission::ManageGallery],
        ))
        .await;
    let Ok(created) = created else {
        panic!("expected role to be created");
    };
    assert_eq!(
        created.permissions,
        vec![Permission::ManageLivestreams, Permission::ManageGallery]
    );

    let duplicate = repository
        .create_role(role_input(name.as_str(), Vec::new()))
        .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let updated = repository
        .update_role(
            created.role_id,
            UpdateRoleInput {
                permissions: Some(vec![Permission::ManageEvents]),
                ..UpdateRoleInput::default()
            },
        )
        .await;
    assert_eq!(
        updated.ok().map(|role| role.permissions),
        Some(vec![Permission::ManageEvents])
    );

    let found = repository.find_role_by_name(name.as_str()).await;
    assert_eq!(
        found.ok().flatten().map(|role| role.description),
        Some("Test role".to_owned())
    );
}

#[tokio::test]
async fn user_role_resolution_reflects_assignment_changes() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresRoleRepository::new(pool.clone());
    let name = format!("greeter_{}", unique_suffix());

    let Ok(role) = repository
        .create_role(role_input(name.as_str(), vec![Permission::SubmitFeedback]))
        .await
    else {
        panic!("expected role to be created");
    };
    let user_id = insert_user(&pool, None).await;

    let unassigned = repository.resolve_role_for_user(user_id).await;
    assert_eq!(unassigned.ok(), Some(RoleResolution::Unassigned));

    assert!(
        repository
            .set_user_role(user_id, Some(role.role_id))
            .await
            .is_ok()
    );
    let resolved = repository.resolve_role_for_user(user_id).await;
    let Ok(RoleResolution::Resolved(resolved)) = resolved else {
        panic!("expected role to resolve");
    };
    assert_eq!(resolved.name, name);
    assert_eq!(resolved.permissions, vec![Permission::SubmitFeedback]);

    let blocked = repository.delete_role(role.role_id).await;
    assert!(matches!(blocked, Err(AppError::Conflict(_))));
    assert_eq!(
        repository.count_users_with_role(role.role_id).await.ok(),
        Some(1)
    );

    assert!(repository.set_user_role(user_id, None).await.is_ok());
    assert!(repository.delete_role(role.role_id).await.is_ok());
}

#[tokio::test]
async fn missing_users_and_roles_are_not_found() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresRoleRepository::new(pool);

    let resolution = repository.resolve_role_for_user(UserId::new()).await;
    assert!(matches!(resolution, Err(AppError::NotFound(_))));

    let assignment = repository.set_user_role(UserId::new(), None).await;
    assert!(matches!(assignment, Err(AppError::NotFound(_))));

    let deletion = repository.delete_role(RoleId::new()).await;
    assert!(matches!(deletion, Err(AppError::NotFound(_))));
}
