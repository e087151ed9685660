pub const PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const SESSION_COOKIE: &str = "session";
pub const DEFAULT_SESSION_LIFETIME_HOURS: i64 = 24;

pub const EMAIL_MAX_LENGTH: usize = 254;
pub const USER_FIELD_MAX_LENGTH: usize = 150;
pub const RECIPE_NAME_MAX_LENGTH: usize = 200;
pub const TAG_FIELD_MAX_LENGTH: usize = 30;
pub const INGREDIENT_NAME_MAX_LENGTH: usize = 150;
pub const MEASUREMENT_UNIT_MAX_LENGTH: usize = 25;

pub const USERNAME_PATTERN: &str = r"^[\w.@+-]+$";
pub const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";
pub const SLUG_PATTERN: &str = r"^[-a-zA-Z0-9_]+$";
pub const COLOR_PATTERN: &str = r"^#[0-9a-fA-F]{6}$";

pub const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("png", "png"),
    ("jpeg", "jpg"),
    ("jpg", "jpg"),
    ("gif", "gif"),
    ("webp", "webp"),
];

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

pub const CACHE_TTL_SECONDS: u64 = 600;

pub const MEDIA_URL: &str = "/media/";
pub const RECIPE_IMAGE_DIR: &str = "recipes";
