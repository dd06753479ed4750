//! Community manager
//!
//! Owns the registry of live aggregates, persists them through a
//! [`CommunityStore`] and fans notifications out to subscribers. All
//! network input enters here: signed descriptions from the control node
//! and signed event batches from privileged members.
//!
//! The aggregate lock is synchronous and never held across an `.await`;
//! every async step works on a snapshot.

mod store;
mod subscription;
mod tasks;

pub use store::{CommunityRecord, CommunityStore, CommunityToValidate, InMemoryStore, StoreError};
pub use subscription::{CommunityResponse, Subscription};
pub use tasks::TaskRegistry;

use crate::changes::CommunityChanges;
use crate::community::{
    calculate_request_id, evaluate_changes, Community, CommunityConfig, CommunityState,
    SystemTimeSource, TimeSource,
};
use crate::config::CommunitiesConfig;
use crate::crypto::{PrivateKey, PublicKey};
use crate::description::{
    unwrap_description, CommunityDescription, CommunityMember, MemberRole, RevealedAccount,
    TokenPermission, TokenPermissionType,
};
use crate::encryption::{evaluate_community_encryption_key_actions, KeyDistributor};
use crate::errors::{CommunityError, CommunityResult};
use crate::events::{CommunityEventKind, CommunityEventsMessage};
use crate::permissions::{
    AccountChainIdsCombination, Address, CheckChannelPermissionsResponse, CheckPermissionsResponse,
    PermissionChecker,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

const OWNER_VERIFICATION_TASK: &str = "owner-verification";

/// Resolves who currently owns a token-gated community on chain
#[async_trait]
pub trait OwnerVerifier: Send + Sync {
    async fn signer_public_key(&self, chain_id: u64, community_id: &str) -> CommunityResult<PublicKey>;
}

/// Roles granted during one re-evaluation pass
pub type NewPrivilegedRoles = BTreeMap<MemberRole, Vec<PublicKey>>;

pub struct CommunityManager {
    identity: PrivateKey,
    config: CommunitiesConfig,
    store: Arc<dyn CommunityStore>,
    communities: RwLock<HashMap<Vec<u8>, Arc<Community>>>,
    permission_checker: Arc<dyn PermissionChecker>,
    key_distributor: Option<Arc<dyn KeyDistributor>>,
    owner_verifier: Option<Arc<dyn OwnerVerifier>>,
    time_source: Arc<dyn TimeSource>,
    subscriptions: Mutex<Vec<mpsc::Sender<Subscription>>>,
    stopped: AtomicBool,
    tasks: TaskRegistry,
}

impl CommunityManager {
    pub fn new(
        identity: PrivateKey,
        config: CommunitiesConfig,
        store: Arc<dyn CommunityStore>,
        permission_checker: Arc<dyn PermissionChecker>,
    ) -> Self {
        Self {
            identity,
            config,
            store,
            communities: RwLock::new(HashMap::new()),
            permission_checker,
            key_distributor: None,
            owner_verifier: None,
            time_source: Arc::new(SystemTimeSource),
            subscriptions: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
            tasks: TaskRegistry::new(),
        }
    }

    pub fn with_key_distributor(mut self, distributor: Arc<dyn KeyDistributor>) -> Self {
        self.key_distributor = Some(distributor);
        self
    }

    pub fn with_owner_verifier(mut self, verifier: Arc<dyn OwnerVerifier>) -> Self {
        self.owner_verifier = Some(verifier);
        self
    }

    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    pub fn identity(&self) -> PublicKey {
        self.identity.public_key()
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    // ---- lifecycle ----

    /// Start owner verification and member re-evaluation for every
    /// community this node controls
    pub async fn start(self: &Arc<Self>) -> CommunityResult<()> {
        self.stopped.store(false, Ordering::Release);

        if self.owner_verifier.is_some() {
            let manager = Arc::downgrade(self);
            self.tasks.spawn_interval(
                OWNER_VERIFICATION_TASK,
                self.config.owner_verification_interval,
                move || {
                    let manager = manager.clone();
                    async move {
                        let Some(manager) = manager.upgrade() else {
                            return;
                        };
                        if let Err(e) = manager.run_owner_verification().await {
                            warn!(error = %e, "owner verification failed");
                        }
                    }
                },
            );
        }

        for community in self.all().await? {
            if community.is_control_node() {
                self.reevaluate_members_periodically(community.id());
            }
        }

        info!(identity = %self.identity().to_compressed_hex(), "community manager started");
        Ok(())
    }

    /// Close every subscription and stop the background loops
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.subscriptions.lock().clear();
        self.tasks.shutdown().await;
        info!("community manager stopped");
    }

    // ---- subscriptions ----

    pub fn subscribe(&self) -> mpsc::Receiver<Subscription> {
        let (tx, rx) = mpsc::channel(self.config.subscription_buffer);
        self.subscriptions.lock().push(tx);
        rx
    }

    /// Deliver to every subscriber without waiting; full channels lose the
    /// notification, closed ones are forgotten
    fn publish(&self, subscription: Subscription) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }

        self.subscriptions
            .lock()
            .retain(|tx| match tx.try_send(subscription.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!("subscriber channel full, dropping notification");
                    metrics::counter!("communities_notifications_dropped_total").increment(1);
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            });
    }

    // ---- registry ----

    async fn find(&self, id: &PublicKey) -> CommunityResult<Option<Arc<Community>>> {
        let key = id.compressed();
        if let Some(community) = self.communities.read().await.get(&key) {
            return Ok(Some(community.clone()));
        }

        let Some(record) = self.store.load_community(&key).await? else {
            return Ok(None);
        };
        let community = Arc::new(record.into_community(self.identity(), self.time_source.clone())?);

        let mut registry = self.communities.write().await;
        Ok(Some(registry.entry(key).or_insert(community).clone()))
    }

    pub async fn get_by_id(&self, id: &PublicKey) -> CommunityResult<Arc<Community>> {
        self.find(id).await?.ok_or(CommunityError::CommunityNotFound)
    }

    /// Every stored community, sharing live aggregates with the registry
    pub async fn all(&self) -> CommunityResult<Vec<Arc<Community>>> {
        let mut result = Vec::new();
        for record in self.store.all_communities().await? {
            let id = PublicKey::from_sec1_bytes(&record.id)?;
            result.push(self.get_by_id(&id).await?);
        }
        Ok(result)
    }

    pub async fn delete_community(&self, id: &PublicKey) -> CommunityResult<()> {
        let key = id.compressed();
        self.tasks.cancel(&reevaluation_task_key(id));
        self.communities.write().await.remove(&key);
        self.store.delete_communities_to_validate(&key).await?;
        self.store.delete_community(&key).await?;
        info!(community_id = %id.to_compressed_hex(), "community deleted");
        Ok(())
    }

    async fn register(&self, community: Arc<Community>) {
        self.communities
            .write()
            .await
            .insert(community.id().compressed(), community);
    }

    async fn save(&self, community: &Community) -> CommunityResult<()> {
        self.store
            .save_community(CommunityRecord::from_state(&community.snapshot()))
            .await?;
        Ok(())
    }

    /// Persist and announce: the control node re-signs its description,
    /// other members sign and broadcast their pending events
    pub async fn save_and_publish(&self, community: &Arc<Community>) -> CommunityResult<()> {
        if community.is_control_node() {
            community.to_protocol_message_bytes()?;
            self.save(community).await?;
            self.publish(Subscription::Community(community.clone()));
            return Ok(());
        }

        community.sign_events(&self.identity)?;
        self.save(community).await?;
        if let Some(message) = community.to_events_message() {
            let payload = message.to_signed_message(&self.identity)?;
            self.publish(Subscription::CommunityEventsMessage {
                community_id: message.community_id,
                payload,
            });
        }
        Ok(())
    }

    async fn handle_key_actions(
        &self,
        origin: &CommunityState,
        modified: &CommunityState,
    ) -> CommunityResult<()> {
        let Some(distributor) = &self.key_distributor else {
            return Ok(());
        };
        let actions = evaluate_community_encryption_key_actions(origin, modified);
        if actions.is_empty() {
            return Ok(());
        }

        debug!(
            community_id = %modified.id_string(),
            community_action = ?actions.community_key_action.action_type,
            channels = actions.channel_keys_actions.len(),
            "handling encryption key actions"
        );
        distributor.generate(modified, &actions).await?;
        distributor.distribute(modified, &actions).await
    }

    // ---- local operations ----

    /// Create a community controlled by a fresh key, with this node's
    /// identity as the owner
    pub async fn create_community(&self, template: CommunityDescription) -> CommunityResult<Arc<Community>> {
        let key = PrivateKey::generate();
        let id = key.public_key();

        let mut description = template;
        description.id = id.to_compressed_hex();
        description.clock = 1;
        description.members.insert(
            self.identity().to_hex(),
            CommunityMember::with_roles(vec![MemberRole::Owner]),
        );

        let mut config = CommunityConfig::new(id, self.identity(), description);
        config.private_key = Some(key);
        config.control_device = true;
        config.joined = true;
        config.joined_at = self.time_source.now_secs();
        config.verified = true;

        let community = Arc::new(Community::new(config, self.time_source.clone())?);
        self.save(&community).await?;
        self.register(community.clone()).await;
        self.publish(Subscription::Community(community.clone()));

        info!(community_id = %community.id_string(), "community created");
        Ok(community)
    }

    /// Run a mutation and persist the outcome. On the control node the
    /// resulting key actions are handed to the key distributor.
    pub async fn mutate<F>(&self, id: &PublicKey, f: F) -> CommunityResult<CommunityResponse>
    where
        F: FnOnce(&Community) -> CommunityResult<CommunityChanges>,
    {
        let community = self.get_by_id(id).await?;
        let origin = community.snapshot();
        let changes = f(&community)?;

        if community.is_control_node() {
            self.handle_key_actions(&origin, &community.snapshot()).await?;
        }
        self.save_and_publish(&community).await?;
        Ok(CommunityResponse { community, changes })
    }

    /// Accept a request to join; the control node first checks the
    /// revealed accounts against the join permissions
    pub async fn accept_request_to_join(
        &self,
        id: &PublicKey,
        request_id: &[u8],
    ) -> CommunityResult<CommunityResponse> {
        let community = self.get_by_id(id).await?;
        let request = community
            .request_to_join(request_id)
            .ok_or(CommunityError::RequestToJoinNotFound)?;

        if community.is_control_node() {
            let addresses: Vec<Address> = request
                .revealed_accounts
                .iter()
                .map(|a| a.address.clone())
                .collect();
            let response = self
                .permission_checker
                .check_permission_to_join(&community.description(), &addresses)
                .await?;
            if !response.satisfied {
                debug!(
                    community_id = %community.id_string(),
                    member = %request.public_key,
                    "request to join does not satisfy permissions"
                );
                return Err(CommunityError::NoPermissionToJoin);
            }
        }

        self.mutate(id, |c| c.accept_request_to_join(request_id)).await
    }

    pub async fn check_permission_to_join(
        &self,
        id: &PublicKey,
        addresses: &[Address],
    ) -> CommunityResult<CheckPermissionsResponse> {
        let community = self.get_by_id(id).await?;
        self.permission_checker
            .check_permission_to_join(&community.description(), addresses)
            .await
    }

    pub async fn check_channel_permissions(
        &self,
        id: &PublicKey,
        channel_id: &str,
        accounts_and_chain_ids: &[AccountChainIdsCombination],
    ) -> CommunityResult<CheckChannelPermissionsResponse> {
        let community = self.get_by_id(id).await?;
        let view_only =
            community.channel_token_permissions_by_type(channel_id, TokenPermissionType::CanViewChannel);
        let view_and_post = community
            .channel_token_permissions_by_type(channel_id, TokenPermissionType::CanViewAndPostChannel);
        self.permission_checker
            .check_channel_permissions(&view_only, &view_and_post, accounts_and_chain_ids, false)
            .await
    }

    // ---- network input ----

    /// Apply a signed description from the control node.
    ///
    /// Token-owned communities whose owner was not verified yet are queued
    /// and `Ok(None)` is returned; so are descriptions not newer than the
    /// current one.
    pub async fn handle_community_description_message(
        &self,
        payload: &[u8],
        verified_owner: Option<PublicKey>,
    ) -> CommunityResult<Option<CommunityResponse>> {
        let (signer, description) = unwrap_description(payload)?;
        let id = if description.id.is_empty() {
            signer
        } else {
            PublicKey::from_hex(&description.id)?
        };
        let existing = self.find(&id).await?;

        if description.has_token_ownership() && verified_owner.is_none() {
            let needs_verification = match &existing {
                None => true,
                Some(c) => c.control_node() != signer && description.clock > c.clock(),
            };
            if needs_verification {
                self.queue_for_validation(&id, &description, payload, &signer)
                    .await?;
                return Ok(None);
            }
        }

        let control_node = match verified_owner {
            Some(owner) if owner != signer => return Err(CommunityError::NotAuthorized),
            Some(owner) => owner,
            None => {
                let expected = existing.as_ref().map(|c| c.control_node()).unwrap_or(id);
                if expected != signer {
                    return Err(CommunityError::NotAuthorized);
                }
                signer
            }
        };

        let community = match existing {
            Some(community) => {
                if description.clock <= community.clock() {
                    debug!(
                        community_id = %community.id_string(),
                        clock = description.clock,
                        current = community.clock(),
                        "ignoring outdated community description"
                    );
                    return Ok(None);
                }
                community
            }
            None => {
                let mut config = CommunityConfig::new(id, self.identity(), description.clone());
                config.description_message = payload.to_vec();
                config.control_node = Some(control_node);
                Arc::new(Community::new(config, self.time_source.clone())?)
            }
        };

        if verified_owner.is_some() && control_node != self.identity() && community.is_control_node() {
            info!(community_id = %community.id_string(), "control of community moved to another owner");
            community.set_private_key(None);
            community.set_control_device(false);
        }

        let new_control_node = verified_owner.map(|_| control_node);
        let mut changes =
            community.update_community_description(description, payload.to_vec(), new_control_node)?;

        let me = self.identity();
        if !community.joined() && community.has_member(&me) {
            if community.mark_request_to_join_accepted(&me) {
                debug!(community_id = %community.id_string(), "request to join accepted");
            }
            changes.should_member_join = true;
        }

        self.save(&community).await?;
        self.register(community.clone()).await;
        self.publish(Subscription::Community(community.clone()));

        Ok(Some(CommunityResponse { community, changes }))
    }

    async fn queue_for_validation(
        &self,
        id: &PublicKey,
        description: &CommunityDescription,
        payload: &[u8],
        signer: &PublicKey,
    ) -> CommunityResult<()> {
        info!(
            community_id = %id.to_compressed_hex(),
            clock = description.clock,
            "queueing token-owned community for owner verification"
        );
        self.store
            .save_community_to_validate(CommunityToValidate {
                id: id.compressed(),
                clock: description.clock,
                payload: payload.to_vec(),
                signer: signer.compressed(),
                validate_at: self.time_source.now_secs(),
            })
            .await?;
        Ok(())
    }

    /// Check queued token-owned descriptions against the on-chain owner,
    /// newest first. Returns how many communities were validated.
    pub async fn run_owner_verification(&self) -> CommunityResult<usize> {
        let Some(verifier) = self.owner_verifier.clone() else {
            return Ok(0);
        };

        let mut queued: BTreeMap<Vec<u8>, Vec<CommunityToValidate>> = BTreeMap::new();
        for entry in self.store.communities_to_validate().await? {
            queued.entry(entry.id.clone()).or_default().push(entry);
        }

        let mut validated = 0;
        for (id, mut entries) in queued {
            entries.sort_by(|a, b| b.clock.cmp(&a.clock));

            for entry in entries {
                let description = match unwrap_description(&entry.payload) {
                    Ok((_, description)) => description,
                    Err(e) => {
                        warn!(error = %e, clock = entry.clock, "dropping unreadable queued description");
                        self.store.delete_community_to_validate(&id, entry.clock).await?;
                        continue;
                    }
                };

                let lookup =
                    verifier.signer_public_key(description.token_owner_chain_id(), &description.id);
                let owner = match tokio::time::timeout(self.config.owner_verification_timeout, lookup).await {
                    Ok(Ok(owner)) => owner,
                    Ok(Err(e)) => {
                        warn!(community_id = %description.id, error = %e, "owner lookup failed");
                        continue;
                    }
                    Err(_) => {
                        warn!(community_id = %description.id, "owner lookup timed out");
                        continue;
                    }
                };

                match self
                    .handle_community_description_message(&entry.payload, Some(owner))
                    .await
                {
                    Ok(response) => {
                        self.store.delete_communities_to_validate(&id).await?;
                        if let Some(response) = response {
                            info!(community_id = %description.id, "token-owned community validated");
                            response.community.set_verified(true);
                            self.save(&response.community).await?;
                            self.publish(Subscription::TokenCommunityValidated {
                                community: response.community,
                                changes: response.changes,
                            });
                            validated += 1;
                        }
                        break;
                    }
                    Err(e) => {
                        warn!(
                            community_id = %description.id,
                            clock = entry.clock,
                            error = %e,
                            "queued description failed owner verification"
                        );
                        self.store.delete_community_to_validate(&id, entry.clock).await?;
                    }
                }
            }
        }
        Ok(validated)
    }

    /// Apply a signed events batch from a privileged member.
    ///
    /// A batch built on another description clock is rejected with
    /// `InvalidCommunityEventClock`; on the control node the current signed
    /// description is published so the sender can rebase.
    pub async fn handle_community_events_message(&self, payload: &[u8]) -> CommunityResult<CommunityResponse> {
        let (signer, mut message) = CommunityEventsMessage::from_signed_message(payload)?;
        let id = PublicKey::from_sec1_bytes(&message.community_id)?;
        let community = self.get_by_id(&id).await?;

        if !community.is_privileged_member(&signer) {
            warn!(community_id = %community.id_string(), "events message from unprivileged member");
            return Err(CommunityError::NotAuthorized);
        }
        if community.is_control_node() {
            self.drop_unqualified_accepts(&community, &mut message).await?;
        }

        let origin = community.snapshot();
        let processed = match community.process_events(&message) {
            Err(CommunityError::InvalidCommunityEventClock) if community.is_control_node() => {
                let description_message = community.to_protocol_message_bytes()?;
                self.publish(Subscription::InvalidEventsClock {
                    community_id: message.community_id,
                    description_message,
                });
                return Err(CommunityError::InvalidCommunityEventClock);
            }
            result => result?,
        };
        let modified = community.snapshot();
        let changes = evaluate_changes(&origin, &modified);

        debug!(
            community_id = %community.id_string(),
            applied = processed.applied.len(),
            dropped = processed.dropped,
            clock = community.clock(),
            "events message processed"
        );

        if community.is_control_node() {
            self.handle_key_actions(&origin, &modified).await?;
            self.save_and_publish(&community).await?;
        } else {
            self.save(&community).await?;
        }

        Ok(CommunityResponse { community, changes })
    }

    /// Accepts proposed by other privileged members still have to pass the
    /// join permissions, checked against the accounts the requester revealed
    /// to this node
    async fn drop_unqualified_accepts(
        &self,
        community: &Community,
        message: &mut CommunityEventsMessage,
    ) -> CommunityResult<()> {
        let description = community.description();
        let mut rejected = Vec::new();
        for event in &message.events {
            let CommunityEventKind::RequestToJoinAccept { request, .. } = &event.kind else {
                continue;
            };
            let Some(local) = community.request_to_join(&request.id) else {
                continue;
            };
            let addresses: Vec<Address> = local
                .revealed_accounts
                .iter()
                .map(|a| a.address.clone())
                .collect();
            let response = self
                .permission_checker
                .check_permission_to_join(&description, &addresses)
                .await?;
            if !response.satisfied {
                debug!(
                    community_id = %community.id_string(),
                    member = %local.public_key,
                    "proposed accept does not satisfy join permissions"
                );
                rejected.push(request.id.clone());
            }
        }

        message.events.retain(|event| match &event.kind {
            CommunityEventKind::RequestToJoinAccept { request, .. } => !rejected.contains(&request.id),
            _ => true,
        });
        Ok(())
    }

    // ---- member re-evaluation ----

    /// Re-check every member's token-gated roles, membership and channel
    /// access against their revealed accounts. Control node only.
    pub async fn reevaluate_members(&self, id: &PublicKey) -> CommunityResult<NewPrivilegedRoles> {
        let community = self.get_by_id(id).await?;
        if !community.is_control_node() {
            return Err(CommunityError::NotControlNode);
        }

        let origin = community.snapshot();
        let member_permissions = community.token_permissions_by_type(TokenPermissionType::BecomeMember);
        let admin_permissions = community.token_permissions_by_type(TokenPermissionType::BecomeAdmin);
        let token_master_permissions =
            community.token_permissions_by_type(TokenPermissionType::BecomeTokenMaster);
        let has_member_permissions = !member_permissions.is_empty();

        let mut new_roles = NewPrivilegedRoles::new();
        new_roles.insert(MemberRole::TokenMaster, Vec::new());
        new_roles.insert(MemberRole::Admin, Vec::new());

        let me = self.identity().to_hex();
        for (member_key, member) in community.members() {
            if member_key == me || member.has_role(MemberRole::Owner) {
                continue;
            }
            let member_pk = PublicKey::from_hex(&member_key)?;
            let is_token_master = member.has_role(MemberRole::TokenMaster);
            let is_admin = member.has_role(MemberRole::Admin);

            let revealed = revealed_accounts(&community, &member_key, &member);
            if revealed.is_empty() && (has_member_permissions || is_token_master || is_admin) {
                debug!(community_id = %community.id_string(), member = %member_key, "removing member without revealed accounts");
                community.remove_user_from_org(&member_pk)?;
                continue;
            }
            let accounts: Vec<AccountChainIdsCombination> = revealed
                .iter()
                .map(|a| AccountChainIdsCombination::new(&a.address, a.chain_ids.clone()))
                .collect();

            let token_master = self
                .reevaluate_privileged_member(
                    &community,
                    &token_master_permissions,
                    &accounts,
                    &member_pk,
                    MemberRole::TokenMaster,
                    is_token_master,
                )
                .await?;
            if token_master {
                if !is_token_master {
                    new_roles.entry(MemberRole::TokenMaster).or_default().push(member_pk);
                }
                continue;
            }

            let admin = self
                .reevaluate_privileged_member(
                    &community,
                    &admin_permissions,
                    &accounts,
                    &member_pk,
                    MemberRole::Admin,
                    is_admin,
                )
                .await?;
            if admin {
                if !is_admin {
                    new_roles.entry(MemberRole::Admin).or_default().push(member_pk);
                }
                continue;
            }

            if has_member_permissions {
                let response = self
                    .permission_checker
                    .check_permissions(&member_permissions, &accounts, true)
                    .await?;
                if !response.satisfied {
                    debug!(community_id = %community.id_string(), member = %member_key, "member no longer satisfies permissions");
                    community.remove_user_from_org(&member_pk)?;
                    continue;
                }
            }

            self.reevaluate_channels(&community, &accounts, &member_pk)
                .await?;
        }

        let modified = community.snapshot();
        let changes = evaluate_changes(&origin, &modified);
        self.handle_key_actions(&origin, &modified).await?;
        self.save_and_publish(&community).await?;
        if !changes.is_empty() {
            self.publish(Subscription::MembersReevaluated {
                community_id: id.compressed(),
                changes,
            });
        }

        Ok(new_roles)
    }

    /// Returns whether the member holds `role` after the check
    async fn reevaluate_privileged_member(
        &self,
        community: &Community,
        permissions: &[TokenPermission],
        accounts: &[AccountChainIdsCombination],
        member: &PublicKey,
        role: MemberRole,
        mut has_role: bool,
    ) -> CommunityResult<bool> {
        let has_permissions = !permissions.is_empty();
        let mut remove_role = false;

        if has_permissions {
            let response = self
                .permission_checker
                .check_permissions(permissions, accounts, true)
                .await?;
            if response.satisfied && !has_role {
                community.add_role_to_member(member, role)?;
                has_role = true;
            } else if !response.satisfied && has_role {
                remove_role = true;
            }
        }

        if remove_role || (!has_permissions && has_role) {
            community.remove_role_from_member(member, role)?;
            has_role = false;
        }

        if has_role {
            for channel_id in community.chats().keys() {
                if !community.is_member_in_chat(member, channel_id) {
                    community.add_member_to_chat(channel_id, member, vec![role])?;
                }
            }
        }

        Ok(has_role)
    }

    async fn reevaluate_channels(
        &self,
        community: &Community,
        accounts: &[AccountChainIdsCombination],
        member: &PublicKey,
    ) -> CommunityResult<()> {
        for channel_id in community.chats().keys() {
            let view_only =
                community.channel_token_permissions_by_type(channel_id, TokenPermissionType::CanViewChannel);
            let view_and_post = community
                .channel_token_permissions_by_type(channel_id, TokenPermissionType::CanViewAndPostChannel);

            if view_only.is_empty() && view_and_post.is_empty() {
                community.populate_chat_with_all_members(channel_id)?;
                continue;
            }

            let response = self
                .permission_checker
                .check_channel_permissions(&view_only, &view_and_post, accounts, true)
                .await?;
            let in_channel = community.is_member_in_chat(member, channel_id);

            if response.view_only.satisfied || response.view_and_post.satisfied {
                if !in_channel {
                    community.add_member_to_chat(channel_id, member, Vec::new())?;
                }
            } else if in_channel {
                community.remove_user_from_chat(member, channel_id)?;
            }
        }
        Ok(())
    }

    /// Start the periodic re-evaluation loop for one community; a second
    /// call for the same community is a no-op
    pub fn reevaluate_members_periodically(self: &Arc<Self>, id: PublicKey) -> bool {
        if self.stopped.load(Ordering::Acquire) {
            return false;
        }

        let key = reevaluation_task_key(&id);
        let manager = Arc::downgrade(self);
        let task_key = key.clone();
        self.tasks.spawn_interval(key, self.config.member_reevaluation_interval, move || {
            let manager = manager.clone();
            let task_key = task_key.clone();
            async move {
                let Some(manager) = manager.upgrade() else {
                    return;
                };
                match manager.reevaluate_members(&id).await {
                    Ok(_) => {}
                    Err(CommunityError::CommunityNotFound) | Err(CommunityError::NotControlNode) => {
                        debug!(community_id = %id.to_compressed_hex(), "stopping member re-evaluation");
                        manager.tasks.cancel(&task_key);
                    }
                    Err(e) => {
                        debug!(community_id = %id.to_compressed_hex(), error = %e, "failed to re-evaluate members");
                    }
                }
            }
        })
    }

    pub fn stop_reevaluating_members(&self, id: &PublicKey) -> bool {
        self.tasks.cancel(&reevaluation_task_key(id))
    }
}

fn reevaluation_task_key(id: &PublicKey) -> String {
    format!("reevaluate-{}", id.to_compressed_hex())
}

/// Accounts revealed with the member's request to join, falling back to
/// the ones recorded in the description
fn revealed_accounts(community: &Community, member_key: &str, member: &CommunityMember) -> Vec<RevealedAccount> {
    let request_id = calculate_request_id(member_key, &community.id_string());
    community
        .request_to_join(&request_id)
        .map(|r| r.revealed_accounts)
        .filter(|accounts| !accounts.is_empty())
        .unwrap_or_else(|| member.revealed_accounts.clone())
}
