use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};
use unic_langid::LanguageIdentifier;

/// Internationalization service using Fluent (thread-safe)
pub struct I18n {
    bundles: RwLock<HashMap<String, FluentBundle<FluentResource>>>,
    default_locale: String,
}

impl I18n {
    /// Create a new i18n service with embedded English and Arabic translations
    pub fn new() -> Self {
        let i18n = Self {
            bundles: RwLock::new(HashMap::new()),
            default_locale: "en".to_string(),
        };

        i18n.load_embedded_en();
        i18n.load_embedded_ar();

        i18n
    }

    /// Add a locale with translations
    pub fn add_locale(&self, locale: &str, content: &str) -> Result<(), String> {
        let lang_id: LanguageIdentifier = locale
            .parse()
            .map_err(|e| format!("Invalid locale '{}': {}", locale, e))?;

        let resource = FluentResource::try_new(content.to_string())
            .map_err(|(_, errors)| format!("Failed to parse Fluent resource: {:?}", errors))?;

        let mut bundle = FluentBundle::new_concurrent(vec![lang_id]);
        bundle
            .add_resource(resource)
            .map_err(|errors| format!("Failed to add resource to bundle: {:?}", errors))?;

        let mut bundles = self.bundles.write().unwrap_or_else(PoisonError::into_inner);
        bundles.insert(locale.to_string(), bundle);

        debug!(locale = %locale, "Loaded translations");

        Ok(())
    }

    /// Get a translated message
    pub fn get(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> String {
        // Try requested locale, fall back to default, fall back to key
        self.try_get(locale, key, args)
            .or_else(|| self.try_get(&self.default_locale, key, args))
            .unwrap_or_else(|| key.to_string())
    }

    /// Try to get a translation from a specific locale
    fn try_get(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> Option<String> {
        let bundles = self.bundles.read().unwrap_or_else(PoisonError::into_inner);
        let bundle = bundles.get(locale)?;
        let message = bundle.get_message(key)?;
        let pattern = message.value()?;

        let mut errors = vec![];
        let result = bundle.format_pattern(pattern, args, &mut errors);

        if !errors.is_empty() {
            warn!(key = %key, errors = ?errors, "Fluent formatting errors");
        }

        Some(result.to_string())
    }

    /// Get a translated message with arguments
    pub fn format(&self, locale: &str, key: &str, args: &[(&str, &str)]) -> String {
        let mut fluent_args = FluentArgs::new();
        for (k, v) in args {
            fluent_args.set(*k, *v);
        }
        self.get(locale, key, Some(&fluent_args))
    }

    /// Whether translations are loaded for a locale
    pub fn supports(&self, locale: &str) -> bool {
        self.bundles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(locale)
    }

    /// Load embedded English translations
    fn load_embedded_en(&self) {
        let en_translations = r#"
# ImageToTextPro Service - English Translations

# Errors
error-invalid-file-type = Invalid file type. Please upload an image file.
error-read-failure = The image could not be read. Please choose another file.
error-file-too-large = The image is too large. The maximum size is { $max } bytes.
error-no-image = No image. Please upload an image first.
error-extraction-failed = Failed to extract text. Please try again with a clearer image.
error-export-failed = The Word document could not be generated.
error-no-text = There is no text to export.
error-no-artifact = No exported document is available yet.
error-superseded = A newer image replaced this one before its text was ready.
error-internal = An internal error occurred

# Pipeline
pipeline-idle = Waiting for an image
pipeline-validating = Checking the image...
pipeline-extracting = Extracting text...
pipeline-succeeded = Text extracted. Your Word document is ready.
pipeline-empty-result = No Arabic text found. The OCR could not find any Arabic text in the image.

# Health
health-status-healthy = Service is healthy
health-status-degraded = Service is degraded: { $reason }
"#;

        if let Err(e) = self.add_locale("en", en_translations) {
            warn!(error = %e, "Failed to load embedded English translations");
        }
    }

    /// Load embedded Arabic translations
    fn load_embedded_ar(&self) {
        let ar_translations = r#"
# ImageToTextPro Service - Arabic Translations

# Errors
error-invalid-file-type = نوع الملف غير صالح. يرجى رفع ملف صورة.
error-read-failure = تعذّرت قراءة الصورة. يرجى اختيار ملف آخر.
error-file-too-large = الصورة كبيرة جدًا. الحد الأقصى للحجم هو { $max } بايت.
error-no-image = لا توجد صورة. يرجى رفع صورة أولًا.
error-extraction-failed = فشل استخراج النص. يرجى المحاولة مرة أخرى بصورة أوضح.
error-export-failed = تعذّر إنشاء مستند Word.
error-no-text = لا يوجد نص للتصدير.
error-no-artifact = لا يوجد مستند مُصدَّر بعد.
error-superseded = استُبدلت هذه الصورة بصورة أحدث قبل جاهزية نصها.
error-internal = حدث خطأ داخلي

# Pipeline
pipeline-idle = في انتظار صورة
pipeline-validating = جارٍ التحقق من الصورة...
pipeline-extracting = جارٍ استخراج النص...
pipeline-succeeded = تم استخراج النص. مستند Word جاهز.
pipeline-empty-result = لم يتم العثور على نص عربي في الصورة.

# Health
health-status-healthy = الخدمة تعمل بشكل سليم
health-status-degraded = الخدمة متدهورة: { $reason }
"#;

        if let Err(e) = self.add_locale("ar", ar_translations) {
            warn!(error = %e, "Failed to load embedded Arabic translations");
        }
    }
}

impl Default for I18n {
    fn default() -> Self {
        Self::new()
    }
}
