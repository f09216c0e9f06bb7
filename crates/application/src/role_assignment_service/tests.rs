use chrono::Duration;
use rendezvous_core::{AppError, DenialReason};
use rendezvous_domain::{
    AssignmentScope, AuditAction, BusinessContextId, ContextType, Role, RoleAssignmentId,
    ScopeBinding, UserId,
};
use serde_json::json;

use crate::test_support::{Harness, Tree};

use super::AssignRoleInput;

fn assign_input(
    tree: &Tree,
    user_id: UserId,
    role: Role,
    scope: AssignmentScope,
) -> AssignRoleInput {
    let (location_id, department_id) = match scope {
        AssignmentScope::Business => (None, None),
        AssignmentScope::Location => (Some(tree.location.id()), None),
        AssignmentScope::Department => (Some(tree.location.id()), Some(tree.department_a.id())),
    };

    AssignRoleInput {
        user_id,
        role,
        scope,
        business_id: tree.business.id(),
        location_id,
        department_id,
        expires_at: None,
        notes: None,
        metadata: json!({}),
    }
}

async fn harness_with_owner() -> (Harness, Tree, UserId) {
    let harness = Harness::new();
    let tree = harness.tree().await;
    let admin = harness.platform_admin().await;
    let owner = UserId::new();
    let granted = harness
        .assignment_service
        .grant_initial_owner(admin, tree.business.id(), owner)
        .await;
    assert!(granted.is_ok());

    (harness, tree, owner)
}

#[tokio::test]
async fn department_scope_without_location_is_rejected() {
    let (harness, tree, owner) = harness_with_owner().await;
    let mut input = assign_input(
        &tree,
        UserId::new(),
        Role::Practitioner,
        AssignmentScope::Department,
    );
    input.location_id = None;

    let result = harness.assignment_service.assign(owner, input).await;

    assert!(matches!(
        result,
        Err(AppError::Validation(message)) if message.contains("location_id")
    ));
}

#[tokio::test]
async fn scope_fields_must_match_scope() {
    let (harness, tree, owner) = harness_with_owner().await;
    let mut business_with_location = assign_input(
        &tree,
        UserId::new(),
        Role::Receptionist,
        AssignmentScope::Business,
    );
    business_with_location.location_id = Some(tree.location.id());
    let mut location_without_id = assign_input(
        &tree,
        UserId::new(),
        Role::Receptionist,
        AssignmentScope::Location,
    );
    location_without_id.location_id = None;

    let first = harness
        .assignment_service
        .assign(owner, business_with_location)
        .await;
    let second = harness
        .assignment_service
        .assign(owner, location_without_id)
        .await;

    assert!(matches!(first, Err(AppError::Validation(_))));
    assert!(matches!(second, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn scope_ids_must_match_the_hierarchy() {
    let (harness, tree, owner) = harness_with_owner().await;
    let mut input = assign_input(
        &tree,
        UserId::new(),
        Role::Practitioner,
        AssignmentScope::Location,
    );
    input.location_id = Some(tree.department_a.id());

    let result = harness.assignment_service.assign(owner, input).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn owner_assigns_department_role() {
    let (harness, tree, owner) = harness_with_owner().await;
    let practitioner = UserId::new();

    let assignment = harness
        .assignment_service
        .assign(
            owner,
            assign_input(
                &tree,
                practitioner,
                Role::Practitioner,
                AssignmentScope::Department,
            ),
        )
        .await;

    let Ok(assignment) = assignment else {
        unreachable!("owner should be able to assign");
    };
    assert_eq!(assignment.assigned_by(), owner);
    assert_eq!(assignment.assigned_at(), harness.clock.now_plus(Duration::zero()));
    assert_eq!(assignment.binding().context_id(), tree.department_a.id());

    let active = harness
        .assignment_service
        .find_active_by_user(practitioner)
        .await
        .unwrap_or_default();
    assert_eq!(active.len(), 1);

    let events = harness.audit.events.lock().await;
    assert!(
        events
            .iter()
            .any(|event| event.action == AuditAction::RoleAssigned && event.actor == owner)
    );
}

#[tokio::test]
async fn assigner_needs_manage_roles_over_target_scope() {
    let (harness, tree, _) = harness_with_owner().await;
    let head = UserId::new();
    harness
        .grant(head, Role::DepartmentHead, tree.department_a_scope())
        .await;

    let mut sibling = assign_input(
        &tree,
        UserId::new(),
        Role::Practitioner,
        AssignmentScope::Department,
    );
    sibling.department_id = Some(tree.department_b.id());
    let own_department = assign_input(
        &tree,
        UserId::new(),
        Role::Practitioner,
        AssignmentScope::Department,
    );

    let denied = harness.assignment_service.assign(head, sibling).await;
    let allowed = harness
        .assignment_service
        .assign(head, own_department)
        .await;

    assert!(matches!(denied, Err(AppError::InsufficientPermissions(_))));
    assert!(allowed.is_ok());
}

#[tokio::test]
async fn assigner_must_outrank_granted_role() {
    let (harness, tree, _) = harness_with_owner().await;
    let manager = UserId::new();
    harness
        .grant(manager, Role::LocationManager, tree.location_scope())
        .await;

    let peer = harness
        .assignment_service
        .assign(
            manager,
            assign_input(
                &tree,
                UserId::new(),
                Role::LocationManager,
                AssignmentScope::Location,
            ),
        )
        .await;
    let junior = harness
        .assignment_service
        .assign(
            manager,
            assign_input(
                &tree,
                UserId::new(),
                Role::DepartmentHead,
                AssignmentScope::Department,
            ),
        )
        .await;

    assert!(matches!(
        peer,
        Err(AppError::InsufficientPermissions(denial))
            if denial.reason == DenialReason::InsufficientScopeOrPermission
    ));
    assert!(junior.is_ok());
}

#[tokio::test]
async fn platform_admin_may_grant_owners() {
    let (harness, tree, _) = harness_with_owner().await;
    let admin = UserId::new();
    harness
        .grant(admin, Role::PlatformAdmin, tree.business_scope())
        .await;

    let result = harness
        .assignment_service
        .assign(
            admin,
            assign_input(
                &tree,
                UserId::new(),
                Role::BusinessOwner,
                AssignmentScope::Business,
            ),
        )
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn past_expiry_is_rejected() {
    let (harness, tree, owner) = harness_with_owner().await;
    let mut input = assign_input(
        &tree,
        UserId::new(),
        Role::Assistant,
        AssignmentScope::Location,
    );
    input.expires_at = Some(harness.clock.now_plus(Duration::hours(-1)));

    let result = harness.assignment_service.assign(owner, input).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn inactive_context_cannot_receive_roles() {
    let (harness, tree, owner) = harness_with_owner().await;
    let deactivated = harness
        .context_service
        .deactivate(owner, tree.department_a.id())
        .await;
    assert!(deactivated.is_ok());

    let result = harness
        .assignment_service
        .assign(
            owner,
            assign_input(
                &tree,
                UserId::new(),
                Role::Practitioner,
                AssignmentScope::Department,
            ),
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn revoke_is_idempotent() {
    let (harness, tree, owner) = harness_with_owner().await;
    let assignment = harness
        .grant(UserId::new(), Role::Receptionist, tree.location_scope())
        .await;

    let first = harness
        .assignment_service
        .revoke(assignment.id(), owner, Some("left the company".to_owned()))
        .await;
    harness.clock.advance(Duration::minutes(5));
    let second = harness
        .assignment_service
        .revoke(assignment.id(), UserId::new(), None)
        .await;

    let (Ok(first), Ok(second)) = (first, second) else {
        unreachable!("both revocations should succeed");
    };
    assert!(!first.is_active());
    assert_eq!(first.revocation(), second.revocation());
    assert_eq!(
        second.revocation().and_then(|revocation| revocation.reason.clone()),
        Some("left the company".to_owned())
    );

    let events = harness.audit.events.lock().await;
    let revocations = events
        .iter()
        .filter(|event| event.action == AuditAction::RoleRevoked)
        .count();
    assert_eq!(revocations, 1);
}

#[tokio::test]
async fn revoked_assignment_stops_granting() {
    let (harness, tree, owner) = harness_with_owner().await;
    let user = UserId::new();
    let assignment = harness
        .grant(user, Role::Receptionist, tree.location_scope())
        .await;

    let revoked = harness
        .assignment_service
        .revoke(assignment.id(), owner, None)
        .await;
    assert!(revoked.is_ok());

    let active = harness
        .assignment_service
        .find_active_by_user(user)
        .await
        .unwrap_or_default();
    assert!(active.is_empty());
}

#[tokio::test]
async fn revoke_requires_authority_over_assignment() {
    let (harness, tree, _) = harness_with_owner().await;
    let receptionist = UserId::new();
    harness
        .grant(receptionist, Role::Receptionist, tree.location_scope())
        .await;
    let target = harness
        .grant(UserId::new(), Role::Assistant, tree.location_scope())
        .await;

    let result = harness
        .assignment_service
        .revoke(target.id(), receptionist, None)
        .await;

    assert!(matches!(result, Err(AppError::InsufficientPermissions(_))));
}

#[tokio::test]
async fn revoke_unknown_assignment_is_not_found() {
    let (harness, _, owner) = harness_with_owner().await;

    let result = harness
        .assignment_service
        .revoke(RoleAssignmentId::new(), owner, None)
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn find_active_by_user_excludes_expired() {
    let (harness, tree, _) = harness_with_owner().await;
    let user = UserId::new();
    harness
        .grant_expired(user, Role::Practitioner, tree.department_a_scope())
        .await;
    let live = harness
        .grant(user, Role::Scheduler, tree.location_scope())
        .await;

    let active = harness
        .assignment_service
        .find_active_by_user(user)
        .await
        .unwrap_or_default();

    let ids: Vec<RoleAssignmentId> = active.iter().map(|assignment| assignment.id()).collect();
    assert_eq!(ids, vec![live.id()]);
}

#[tokio::test]
async fn initial_owner_only_once() {
    let (harness, tree, _) = harness_with_owner().await;
    let admin = harness.platform_admin().await;

    let again = harness
        .assignment_service
        .grant_initial_owner(admin, tree.business.id(), UserId::new())
        .await;
    let on_location = harness
        .assignment_service
        .grant_initial_owner(admin, tree.location.id(), UserId::new())
        .await;

    assert!(matches!(again, Err(AppError::Conflict(_))));
    assert!(matches!(on_location, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn initial_owner_requires_create_business_authority() {
    let harness = Harness::new();
    let business = harness
        .create(ContextType::Business, "Unclaimed Studio", None)
        .await;
    let other = harness
        .create(ContextType::Business, "Rival Studio", None)
        .await;
    let rival_owner = UserId::new();
    harness
        .grant(
            rival_owner,
            Role::BusinessOwner,
            ScopeBinding::Business {
                business_id: other.id(),
            },
        )
        .await;
    let expired_owner = UserId::new();
    harness
        .grant_expired(
            expired_owner,
            Role::BusinessOwner,
            ScopeBinding::Business {
                business_id: business.id(),
            },
        )
        .await;

    let by_stranger = harness
        .assignment_service
        .grant_initial_owner(UserId::new(), business.id(), UserId::new())
        .await;
    let by_rival = harness
        .assignment_service
        .grant_initial_owner(rival_owner, business.id(), rival_owner)
        .await;
    let by_lapsed = harness
        .assignment_service
        .grant_initial_owner(expired_owner, business.id(), expired_owner)
        .await;

    assert!(matches!(
        by_stranger,
        Err(AppError::InsufficientPermissions(denial))
            if denial.reason == DenialReason::NoAssignments
    ));
    assert!(matches!(
        by_rival,
        Err(AppError::InsufficientPermissions(denial))
            if denial.reason == DenialReason::InsufficientScopeOrPermission
    ));
    assert!(matches!(by_lapsed, Err(AppError::InsufficientPermissions(_))));
    let owners = harness
        .assignment_service
        .find_active_by_user(rival_owner)
        .await
        .unwrap_or_default();
    assert_eq!(owners.len(), 1);
}

#[tokio::test]
async fn initial_owner_on_fresh_business_holds_every_owner_permission() {
    let harness = Harness::new();
    let admin = harness.platform_admin().await;
    let business = harness
        .create(ContextType::Business, "Fresh Cuts", None)
        .await;
    let owner = UserId::new();

    let granted = harness
        .assignment_service
        .grant_initial_owner(admin, business.id(), owner)
        .await;
    assert!(matches!(granted, Ok(assignment) if assignment.role() == Role::BusinessOwner));

    let permissions = harness
        .evaluator
        .effective_permissions(
            owner,
            &crate::PermissionContext::at(business.id()),
        )
        .await
        .unwrap_or_default();
    assert_eq!(
        &permissions,
        harness.evaluator.catalog().permissions_for(Role::BusinessOwner)
    );
}

#[tokio::test]
async fn list_for_context_orders_by_seniority() {
    let (harness, tree, owner) = harness_with_owner().await;
    harness
        .grant(UserId::new(), Role::Assistant, tree.location_scope())
        .await;
    harness
        .grant(UserId::new(), Role::DepartmentHead, tree.department_a_scope())
        .await;

    let listed = harness
        .assignment_service
        .list_for_context(owner, tree.location.id())
        .await
        .unwrap_or_default();
    let roles: Vec<Role> = listed.iter().map(|assignment| assignment.role()).collect();
    assert_eq!(roles, vec![Role::DepartmentHead, Role::Assistant]);

    let outsider = harness
        .assignment_service
        .list_for_context(UserId::new(), tree.location.id())
        .await;
    assert!(matches!(outsider, Err(AppError::InsufficientPermissions(_))));

    let unknown = harness
        .assignment_service
        .list_for_context(owner, BusinessContextId::new())
        .await;
    assert!(matches!(unknown, Err(AppError::InsufficientPermissions(_))));
}
