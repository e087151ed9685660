use std::future::Future;

use redis::{aio::MultiplexedConnection, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    constants::CACHE_TTL_SECONDS, cryptography::generate_access_token,
    database::error::CacheError, error::Error,
};

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

    pub fn to_string(&self) -> String {
        self.into()
    }
}

impl<T: ToString + Serialize> From<&CacheKey<T>> for String {
    fn from(value: &CacheKey<T>) -> Self {
        match &value._type {
            CacheKeyType::Recipe => format!("recipe-{}", value._value.to_string()),
            CacheKeyType::Tag => format!("tag-{}", value._value.to_string()),
            CacheKeyType::Ingredient => format!("ingredient-{}", value._value.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum CacheKeyType {
    Recipe,
    Tag,
    Ingredient,
}

impl CacheKeyType {
    pub fn new<T: ToString + Serialize>(self, key: T) -> CacheKey<T> {
        CacheKey::from(self, key)
    }
}

impl<T: ToString + Serialize> From<&CacheKey<T>> for CacheLifetime {
    fn from(value: &CacheKey<T>) -> Self {
        match &value._type {
            CacheKeyType::Recipe => CacheLifetime::BindRecipeCache,
            CacheKeyType::Tag => CacheLifetime::BindTagCache,
            CacheKeyType::Ingredient => CacheLifetime::BindIngredientCache,
        }
    }
}

// Cache - wrappers

/// Every value is bound to the current binding of its lifetime; rotating the binding
/// invalidates them all at once.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum CacheLifetime {
    BindRecipeCache,
    BindTagCache,
    BindIngredientCache,
}

impl CacheLifetime {
    /// Redis key holding the current binding of this lifetime.
    pub fn bind_key(self) -> &'static str {
        match self {
            CacheLifetime::BindRecipeCache => "recipe-cache-key",
            CacheLifetime::BindTagCache => "tag-cache-key",
            CacheLifetime::BindIngredientCache => "ingredient-cache-key",
        }
    }

    pub async fn get_cache_bind(
        self,
        cache: &mut MultiplexedConnection,
    ) -> Result<Option<String>, Error> {
        get_cache_value::<&str, String>(self.bind_key(), cache).await
    }
}

#[derive(Serialize, serde::Deserialize, FromRedisValue, ToRedisArgs, Clone)]
pub struct RedisValue<T: serde::Serialize + Send + Sync + Clone> {
    pub value: T,
    _lifetime: CacheLifetime,
    _bind: Option<String>,
}

impl<T: serde::Serialize + Send + Sync + Clone + DeserializeOwned> RedisValue<T> {
    async fn new(
        value: T,
        lifetime: CacheLifetime,
        cache: &mut MultiplexedConnection,
    ) -> Result<Self, Error> {
        let bind = lifetime.get_cache_bind(cache).await?;

        Ok(Self {
            value,
            _lifetime: lifetime,
            _bind: bind,
        })
    }

    async fn validate(&self, cache: &mut MultiplexedConnection) -> Result<bool, Error> {
        Ok(self._bind == self._lifetime.get_cache_bind(cache).await?)
    }

    /// Reads a still-valid value; undecodable entries are deleted in the background.
    async fn lookup<K: ToString + Serialize>(
        key: &CacheKey<K>,
        cache: &mut MultiplexedConnection,
    ) -> Option<Self> {
        let value = get_cache_value::<String, RedisValue<T>>(key.into(), cache)
            .await
            .unwrap_or_else(|_| {
                let mut c = cache.clone();
                let k = key.to_string();
                tokio::spawn(async move {
                    log::error!("> Failed to deserialize cached value. Deleting {}", &k);
                    if let Err(e) = delete_cache_value(k, &mut c).await {
                        log::error!("> Failed to delete cached value! {e}");
                    }
                });
                None
            })?;

        log::trace!("> Found {:?}", key.to_string());
        match value.validate(cache).await {
            Ok(true) => Some(value),
            Ok(false) => {
                log::trace!("> Invalidated {}", key.to_string());
                None
            }
            Err(e) => {
                log::error!("> Failed to validate {}: {e}", key.to_string());
                None
            }
        }
    }

    /// Entries expire after `CACHE_TTL_SECONDS` even when their binding is never rotated.
    async fn store<K: ToString + Serialize>(
        key: &CacheKey<K>,
        value: T,
        cache: &mut MultiplexedConnection,
    ) {
        let lifetime: CacheLifetime = key.into();
        let stored = match RedisValue::new(value, lifetime, cache).await {
            Ok(stored) => stored,
            Err(e) => {
                log::error!("{e:?}");
                return;
            }
        };

        if let Err(e) = set_expiring_cache_value::<String, RedisValue<T>>(
            key.into(),
            stored,
            CACHE_TTL_SECONDS,
            cache,
        )
        .await
        {
            log::error!("{e:?}");
        }
    }
}

/// Optional redis cache; with no connection every lookup goes straight to the callback.
#[derive(Clone, Default)]
pub struct Cache {
    connection: Option<MultiplexedConnection>,
}

impl Cache {
    pub fn disabled() -> Self {
        Self { connection: None }
    }

    /// Connection failures are logged and leave the cache disabled.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else {
            log::info!("REDIS_URL not set, caching disabled");
            return Self::disabled();
        };

        let connection = match redis::Client::open(url) {
            Ok(client) => client.get_multiplexed_async_connection().await,
            Err(e) => Err(e),
        };

        match connection {
            Ok(connection) => {
                log::info!("Connected to redis");
                Self {
                    connection: Some(connection),
                }
            }
            Err(e) => {
                log::error!("Failed to connect to redis, caching disabled: {e}");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.connection.is_some()
    }

    pub async fn get_or<T, K, F, Fut>(&self, key: CacheKey<K>, callback: F) -> Result<T, Error>
    where
        T: Serialize + DeserializeOwned + Send + Sync + Clone,
        K: ToString + Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let Some(connection) = &self.connection else {
            return callback().await;
        };
        let mut connection = connection.clone();

        if let Some(value) = RedisValue::<T>::lookup(&key, &mut connection).await {
            return Ok(value.value);
        }

        log::trace!("> Fetching {:?}", key.to_string());
        let value = callback().await?;
        RedisValue::store(&key, value.clone(), &mut connection).await;

        Ok(value)
    }

    pub async fn invalidate<K: ToString + Serialize>(&self, key: CacheKey<K>) {
        let Some(connection) = &self.connection else {
            return;
        };
        let mut connection = connection.clone();

        if let Err(e) = delete_cache_value(key.to_string(), &mut connection).await {
            log::error!("> Failed to invalidate {}: {e}", key.to_string());
        }
    }

    /// Gives `lifetime` a fresh binding, invalidating every value bound to the old one.
    pub async fn rotate(&self, lifetime: CacheLifetime) {
        let Some(connection) = &self.connection else {
            return;
        };
        let mut connection = connection.clone();
        let bind_key = lifetime.bind_key();

        if let Err(e) = set_cache_value(bind_key, generate_access_token(16), &mut connection).await
        {
            log::error!("> Failed to rotate {bind_key}: {e}");
        }
    }
}

// Cache - raw handlers

pub async fn set_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache
        .set(key, value)
        .await
        .map_err(|e| Error::from(CacheError::from(e)))?;

    Ok(())
}

pub async fn set_expiring_cache_value<
    K: ToRedisArgs + Send + Sync,
    V: ToRedisArgs + Send + Sync,
>(
    key: K,
    value: V,
    seconds: u64,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache
        .set_ex(key, value, seconds)
        .await
        .map_err(|e| Error::from(CacheError::from(e)))?;

    Ok(())
}

pub async fn delete_cache_value<K: ToRedisArgs + Send + Sync>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache
        .del(key)
        .await
        .map_err(|e| Error::from(CacheError::from(e)))?;

    Ok(())
}

pub async fn get_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, Error> {
    let value: Option<V> = cache
        .get(key)
        .await
        .map_err(|e| Error::from(CacheError::from(e)))?;

    Ok(value)
}
