//! Durable conversation storage with an in-memory cache.
//!
//! Every conversation lives in `<root>/<id>.json`. The store keeps one
//! [`ConversationHandle`] per loaded conversation, so all callers within a
//! process observe the same canonical copy. Mutations go memory first, then
//! disk; a failed write is logged and the in-memory state stays
//! authoritative until the next successful save.

use std::collections::HashMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use uuid::Uuid;

use crate::conversation::{
    ContextEntry, Conversation, ConversationId, Message, Metadata, Role,
};
use crate::error::{MalformedRecordError, StoreError};

const RECORD_EXTENSION: &str = "json";

struct Slot {
    id: ConversationId,
    conversation: Mutex<Conversation>,
    turn: Mutex<()>,
}

/// A shared handle to a cached conversation.
///
/// Handles only grant read access; every mutation goes through
/// [`ConversationStore`]. Two handles for the same id obtained from one
/// store are always [`ptr_eq`](Self::ptr_eq).
#[derive(Clone)]
pub struct ConversationHandle(Arc<Slot>);

/// Holds the exclusive right to run a turn on a conversation.
pub type TurnGuard<'a> = MutexGuard<'a, ()>;

impl ConversationHandle {
    fn new(conversation: Conversation) -> Self {
        Self(Arc::new(Slot {
            id: conversation.id().clone(),
            conversation: Mutex::new(conversation),
            turn: Mutex::new(()),
        }))
    }

    /// Returns the conversation id.
    #[inline]
    pub fn id(&self) -> &ConversationId {
        &self.0.id
    }

    /// Returns a copy of the current state.
    pub async fn snapshot(&self) -> Conversation {
        self.0.conversation.lock().await.clone()
    }

    /// See [`Conversation::context_window`].
    pub async fn context_window(
        &self,
        max_messages: Option<usize>,
    ) -> Vec<ContextEntry> {
        self.0.conversation.lock().await.context_window(max_messages)
    }

    /// Returns the number of messages.
    pub async fn len(&self) -> usize {
        self.0.conversation.lock().await.len()
    }

    /// Waits until no other turn runs on this conversation.
    ///
    /// Appends are still allowed while the guard is held; the guard only
    /// serializes callers that take it, so a request/response pair stays
    /// adjacent in the history.
    pub async fn lock_turn(&self) -> TurnGuard<'_> {
        self.0.turn.lock().await
    }

    /// Returns `true` if both handles point to the same cached conversation.
    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

/// File-per-conversation store with a write-through cache.
pub struct ConversationStore {
    root: PathBuf,
    cache: RwLock<HashMap<ConversationId, ConversationHandle>>,
}

impl ConversationStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        if fs::metadata(&root).await.is_err() {
            fs::create_dir_all(&root)
                .await
                .map_err(|err| StoreError::io(&root, err))?;
            info!("created conversation directory {}", root.display());
        }
        Ok(Self {
            root,
            cache: Default::default(),
        })
    }

    /// Returns the storage directory.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates an empty conversation with a fresh id and caches it.
    ///
    /// Nothing is written until the first message is appended or
    /// [`save`](Self::save) is called.
    pub async fn create(&self, metadata: Metadata) -> ConversationHandle {
        let conversation = Conversation::new(ConversationId::generate(), metadata);
        let handle = ConversationHandle::new(conversation);
        self.cache
            .write()
            .await
            .insert(handle.id().clone(), handle.clone());
        info!("created conversation {}", handle.id());
        handle
    }

    /// Looks up a conversation, loading it from disk on a cache miss.
    ///
    /// Unknown ids, invalid ids and unreadable records all yield `None`;
    /// the latter two are logged.
    pub async fn get(&self, id: &str) -> Option<ConversationHandle> {
        let id = match id.parse::<ConversationId>() {
            Ok(id) => id,
            Err(err) => {
                warn!("{err}");
                return None;
            }
        };
        if let Some(handle) = self.cache.read().await.get(&id) {
            return Some(handle.clone());
        }

        let conversation = match self.load(&id).await {
            Ok(Some(conversation)) => conversation,
            Ok(None) => {
                warn!("conversation not found: {id}");
                return None;
            }
            Err(err) => {
                error!("error loading conversation {id}: {err}");
                return None;
            }
        };

        // Another task may have loaded the same record meanwhile, the first
        // insertion wins so identity stays stable.
        let mut cache = self.cache.write().await;
        let handle = cache
            .entry(id)
            .or_insert_with(|| {
                info!("loaded conversation from file: {}", conversation.id());
                ConversationHandle::new(conversation)
            })
            .clone();
        Some(handle)
    }

    /// Writes the conversation behind `handle` to its file, replacing any
    /// previous version atomically.
    ///
    /// The conversation stays locked for the whole write, so the file always
    /// matches a state the cache went through.
    pub async fn save(&self, handle: &ConversationHandle) -> Result<(), StoreError> {
        let conversation = handle.0.conversation.lock().await;
        self.write_record(&conversation).await
    }

    /// Appends a message and persists the conversation.
    ///
    /// Returns `None` if the conversation does not exist; callers must
    /// [`create`](Self::create) it first. A failed save is logged and does
    /// not undo the append.
    pub async fn append_message<S: Into<String>>(
        &self,
        id: &str,
        role: Role,
        content: S,
    ) -> Option<Message> {
        let Some(handle) = self.get(id).await else {
            warn!("cannot add message: conversation {id} not found");
            return None;
        };

        // The lock spans the save so writes of one conversation never
        // overtake each other on disk.
        let mut conversation = handle.0.conversation.lock().await;
        let message = conversation.append(role, content);
        if let Err(err) = self.write_record(&conversation).await {
            error!("error saving conversation {id}: {err}");
        }

        info!("added {role} message to conversation {id}");
        Some(message)
    }

    /// Lists persisted conversations, most recently updated first.
    ///
    /// Files are visited newest first and reading stops once `limit` records
    /// were collected; files sharing the last accepted modification time are
    /// still read. Unreadable records are skipped. Records that are not
    /// cached yet are read without being cached.
    pub async fn list_recent(&self, limit: usize) -> Vec<Conversation> {
        if limit == 0 {
            return vec![];
        }
        let mut files = match self.record_files().await {
            Ok(files) => files,
            Err(err) => {
                error!("error listing conversations: {err}");
                return vec![];
            }
        };
        files.sort_by(|a, b| b.1.cmp(&a.1));

        let mut conversations = Vec::with_capacity(limit.min(files.len()));
        let mut boundary: Option<SystemTime> = None;
        for (stem, modified) in files {
            if boundary.is_some_and(|last| modified < last) {
                break;
            }
            let Ok(id) = stem.parse::<ConversationId>() else {
                warn!("skipping record with invalid name: {stem}");
                continue;
            };
            let Some(conversation) = self.peek(&id).await else {
                continue;
            };
            conversations.push(conversation);
            if conversations.len() == limit {
                boundary = Some(modified);
            }
        }

        conversations.sort_by(|a, b| b.updated_at().cmp(&a.updated_at()));
        conversations.truncate(limit);
        conversations
    }

    /// Returns the cached state of a conversation, or its file contents if
    /// it is not cached. The cache is left untouched.
    async fn peek(&self, id: &ConversationId) -> Option<Conversation> {
        let cached = self.cache.read().await.get(id).cloned();
        if let Some(handle) = cached {
            return Some(handle.snapshot().await);
        }
        match self.load(id).await {
            Ok(conversation) => conversation,
            Err(err) => {
                warn!("skipping conversation {id}: {err}");
                None
            }
        }
    }

    async fn write_record(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let id = conversation.id();
        let text = conversation.to_json().map_err(|source| StoreError::Encode {
            id: id.to_string(),
            source,
        })?;

        let path = self.record_path(id);
        let tmp_path = self
            .root
            .join(format!(".{id}.{}.tmp", Uuid::new_v4().simple()));
        if let Err(err) = write_synced(&tmp_path, text.as_bytes()).await {
            fs::remove_file(&tmp_path).await.ok();
            return Err(StoreError::io(tmp_path, err));
        }
        if let Err(err) = fs::rename(&tmp_path, &path).await {
            fs::remove_file(&tmp_path).await.ok();
            return Err(StoreError::io(path, err));
        }
        // Persist the rename itself. Not every platform can sync a directory.
        if let Err(err) = sync_dir(&self.root).await {
            debug!("could not sync {}: {err}", self.root.display());
        }

        debug!("saved conversation to file: {id}");
        Ok(())
    }

    fn record_path(&self, id: &ConversationId) -> PathBuf {
        self.root.join(format!("{id}.{RECORD_EXTENSION}"))
    }

    async fn load(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        let path = self.record_path(id);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io(path, err)),
        };

        let malformed = |source| StoreError::Malformed {
            id: id.to_string(),
            source,
        };
        let conversation = Conversation::from_json(&text).map_err(malformed)?;
        if conversation.id() != id {
            return Err(malformed(MalformedRecordError::new(format!(
                "record id {} does not match its file name",
                conversation.id()
            ))));
        }
        Ok(Some(conversation))
    }

    /// Returns the stem and modification time of every record file.
    async fn record_files(&self) -> Result<Vec<(String, SystemTime)>, StoreError> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(StoreError::io(&self.root, err)),
        };

        let mut files = vec![];
        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => return Err(StoreError::io(&self.root, err)),
            };
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if stem.starts_with('.') {
                continue;
            }
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(err) => {
                    warn!("skipping {}: {err}", path.display());
                    continue;
                }
            };
            files.push((stem.to_owned(), modified));
        }
        Ok(files)
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

async fn sync_dir(path: &Path) -> std::io::Result<()> {
    fs::File::open(path).await?.sync_all().await
}
