use std::{fmt::Debug, future::Future};

use redis::{aio::MultiplexedConnection, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Error};

// Caching - keys

#[derive(Serialize, Clone, Debug)]
pub struct CacheKey<T: ToString + Serialize> {
    _value: T,
    _type: CacheKeyType,
}

impl<T: ToString + Serialize> CacheKey<T> {
    pub fn from(r#type: CacheKeyType, key: T) -> Self {
        Self {
            _value: key,
            _type: r#type,
        }
    }
}

impl<T: ToString + Serialize> From<&CacheKey<T>> for String {
    fn from(key: &CacheKey<T>) -> String {
        match &key._type {
            CacheKeyType::TagList => format!("tags-{}", key._value.to_string()),
            CacheKeyType::Tag => format!("tag-{}", key._value.to_string()),
            CacheKeyType::ForbiddenWords => format!("forbidden-words-{}", key._value.to_string()),
            CacheKeyType::Custom(_) => key._value.to_string(),
        }
    }
}

impl<T: ToString + Serialize> std::fmt::Display for CacheKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from(self))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum CacheKeyType {
    TagList,
    Tag,
    ForbiddenWords,
    Custom(String),
}

impl CacheKeyType {
    pub fn new<T: ToString + Serialize>(self, key: T) -> CacheKey<T> {
        CacheKey::from(self, key)
    }
}

impl<T: ToString + Serialize> From<&CacheKey<T>> for CacheLifetime {
    fn from(key: &CacheKey<T>) -> CacheLifetime {
        match &key._type {
            CacheKeyType::TagList | CacheKeyType::Tag => CacheLifetime::BindTagCache,
            CacheKeyType::ForbiddenWords => CacheLifetime::BindForbiddenWordCache,
            CacheKeyType::Custom(value) => CacheLifetime::Custom(value.to_owned()),
        }
    }
}

// Cache - wrappers

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum CacheLifetime {
    Infinite,
    Custom(String),
    BindTagCache,
    BindForbiddenWordCache,
}

impl CacheLifetime {
    fn bind_key(&self) -> Option<&'static str> {
        match self {
            CacheLifetime::BindTagCache => Some("tag-cache-key"),
            CacheLifetime::BindForbiddenWordCache => Some("forbidden-word-cache-key"),
            CacheLifetime::Infinite | CacheLifetime::Custom(_) => None,
        }
    }

    pub async fn get_cache_bind(
        &self,
        cache: &mut MultiplexedConnection,
    ) -> Result<Option<String>, CacheError> {
        match self {
            CacheLifetime::Custom(value) => Ok(Some(value.to_owned())),
            _ => match self.bind_key() {
                Some(key) => get_cache_value::<&str, String>(key, cache).await,
                None => Ok(None),
            },
        }
    }

    pub async fn validate_cache_bind(
        &self,
        bind: &Option<String>,
        lifetime: Self,
        cache: &mut MultiplexedConnection,
    ) -> Result<bool, CacheError> {
        match self {
            CacheLifetime::Custom(value) => match lifetime {
                CacheLifetime::Custom(_value) => Ok(value == &_value),
                _ => {
                    log::error!("Found conflicting bindings");
                    Err(CacheError::new(String::from("Conflicting cache bindings")))
                }
            },
            _ => Ok(bind == &self.get_cache_bind(cache).await?),
        }
    }

    /// Moves the binding to a new generation, outdating every value stored under it
    pub async fn invalidate(&self, cache: &mut MultiplexedConnection) -> Result<(), CacheError> {
        if let Some(key) = self.bind_key() {
            set_cache_value(key, uuid::Uuid::new_v4().to_string(), cache).await?;
        }
        Ok(())
    }
}

#[derive(Serialize, serde::Deserialize, FromRedisValue, ToRedisArgs, Clone)]
pub struct RedisValue<T: serde::Serialize + Send + Sync + Clone> {
    pub value: T,
    _lifetime: CacheLifetime,
    _bind: Option<String>,
}

impl<T: serde::Serialize + Send + Sync + Clone + for<'a> Deserialize<'a>> RedisValue<T> {
    async fn new(
        value: T,
        lifetime: CacheLifetime,
        cache: &mut MultiplexedConnection,
    ) -> Result<Self, CacheError> {
        let bind = lifetime.get_cache_bind(cache).await?;

        Ok(Self {
            value,
            _lifetime: lifetime,
            _bind: bind,
        })
    }

    async fn validate<K: ToString + Serialize>(
        &self,
        key: &CacheKey<K>,
        cache: &mut MultiplexedConnection,
    ) -> Result<bool, CacheError> {
        self._lifetime
            .validate_cache_bind(&self._bind, key.into(), cache)
            .await
    }

    async fn lookup<K>(key: &CacheKey<K>, cache: &mut MultiplexedConnection) -> Option<Self>
    where
        K: ToString + Serialize,
    {
        let value = get_cache_value::<String, RedisValue<T>>(key.into(), cache)
            .await
            .unwrap_or_else(|e| {
                let mut c = cache.clone();
                let k = key.to_string();
                tokio::spawn(async move {
                    log::error!("> Failed to read cached value ({e}). Deleting {}", &k);
                    if let Err(e) = delete_cache_value(k, &mut c).await {
                        log::error!("> Failed to delete cached value! {e}");
                    }
                });
                None
            });
        // * Cannot use .map(|| {...}) due to async closures
        match value {
            Some(value) => {
                log::trace!("> Found {}", key);
                match value.validate(key, cache).await {
                    Ok(true) => Some(value),
                    Ok(false) => {
                        log::trace!("> Invalidated {}", key);
                        None
                    }
                    Err(e) => {
                        log::error!("> Failed to validate {}: {e}", key);
                        None
                    }
                }
            }
            None => None,
        }
    }

    async fn store<K>(key: &CacheKey<K>, value: T, cache: &mut MultiplexedConnection) -> Self
    where
        K: ToString + Serialize,
    {
        let lifetime: CacheLifetime = key.into();
        let value = match RedisValue::new(value.clone(), lifetime.clone(), cache).await {
            Ok(value) => value,
            Err(e) => {
                log::error!("> Failed to resolve binding of {}: {e}", key);
                return Self {
                    value,
                    _lifetime: lifetime,
                    _bind: None,
                };
            }
        };

        if let Err(e) = set_cache_value::<String, RedisValue<T>>(key.into(), value.clone(), cache).await {
            log::error!("> Failed to store {}: {e}", key);
        }

        value
    }

    /// Returns the cached value for `key`, or runs `callback` and caches its result.
    /// Cache failures are logged and never fail the lookup.
    pub async fn get_or<F, Fut, K>(
        key: CacheKey<K>,
        cache: &mut MultiplexedConnection,
        callback: F,
    ) -> Result<RedisValue<T>, Error>
    where
        K: ToString + Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        if let Some(value) = Self::lookup(&key, cache).await {
            return Ok(value);
        }

        log::trace!("> Fetching {}", key);
        let value = callback().await?;

        Ok(Self::store(&key, value, cache).await)
    }

    pub async fn get_or_optional<F, Fut, K>(
        key: CacheKey<K>,
        cache: &mut MultiplexedConnection,
        callback: F,
    ) -> Result<Option<RedisValue<T>>, Error>
    where
        K: ToString + Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, Error>>,
    {
        if let Some(value) = Self::lookup(&key, cache).await {
            return Ok(Some(value));
        }

        log::trace!("> Fetching {}", key);
        match callback().await? {
            Some(value) => Ok(Some(Self::store(&key, value, cache).await)),
            None => Ok(None),
        }
    }
}

/// Optional Redis connection. Without one every lookup goes straight to its callback.
#[derive(Clone, Default)]
pub struct Cache {
    connection: Option<MultiplexedConnection>,
}

impl Cache {
    pub fn disabled() -> Self {
        Self { connection: None }
    }

    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else {
            log::info!("REDIS_URL not set, running without cache");
            return Self::disabled();
        };

        let connection = match redis::Client::open(url) {
            Ok(client) => client.get_multiplexed_async_connection().await,
            Err(e) => Err(e),
        };

        match connection {
            Ok(connection) => {
                log::info!("Connected to cache");
                Self {
                    connection: Some(connection),
                }
            }
            Err(e) => {
                log::warn!("Failed to connect to cache, running without it: {e}");
                Self::disabled()
            }
        }
    }

    pub async fn get_or<T, F, Fut, K>(&self, key: CacheKey<K>, callback: F) -> Result<T, Error>
    where
        T: Serialize + Send + Sync + Clone + for<'a> Deserialize<'a>,
        K: ToString + Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        match self.connection.clone() {
            Some(mut connection) => RedisValue::get_or(key, &mut connection, callback)
                .await
                .map(|v| v.value),
            None => callback().await,
        }
    }

    pub async fn get_or_optional<T, F, Fut, K>(
        &self,
        key: CacheKey<K>,
        callback: F,
    ) -> Result<Option<T>, Error>
    where
        T: Serialize + Send + Sync + Clone + for<'a> Deserialize<'a>,
        K: ToString + Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, Error>>,
    {
        match self.connection.clone() {
            Some(mut connection) => RedisValue::get_or_optional(key, &mut connection, callback)
                .await
                .map(|v| v.map(|v| v.value)),
            None => callback().await,
        }
    }

    pub async fn invalidate(&self, lifetime: CacheLifetime) {
        if let Some(mut connection) = self.connection.clone() {
            if let Err(e) = lifetime.invalidate(&mut connection).await {
                log::error!("> Failed to invalidate {lifetime:?}: {e}");
            }
        }
    }
}

// Cache - raw handlers

pub async fn set_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    cache: &mut MultiplexedConnection,
) -> Result<(), CacheError> {
    let _: () = cache.set(key, value).await?;

    Ok(())
}

pub async fn delete_cache_value<K: ToRedisArgs + Send + Sync>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<(), CacheError> {
    let _: () = cache.del(key).await?;

    Ok(())
}

pub async fn get_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, CacheError> {
    let value: Option<V> = cache.get(key).await?;

    Ok(value)
}
