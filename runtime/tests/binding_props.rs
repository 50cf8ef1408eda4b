//! Property tests for model binding keys.

#![allow(clippy::unwrap_used)]

use composable_mvc_core::binding::{ModelBinder, ModelBindingContext};
use composable_mvc_core::metadata::ModelMetadata;
use composable_mvc_core::value_providers::ValueProviderFactoryCollection;
use composable_mvc_runtime::DefaultModelBinder;
use composable_mvc_testing::properties::model_key;
use composable_mvc_testing::{TestController, post, routed};
use proptest::prelude::*;
use serde_json::Value;

proptest! {
    /// A simple value posted under any dotted or indexed key binds back
    /// from that key and is recorded in model state under it.
    #[test]
    fn simple_values_bind_under_their_key(key in model_key(), value in "[a-z0-9]{1,12}") {
        let request = post("/test/index").with_form(key.clone(), value.clone());
        let mut context = TestController::context_for(routed(request, "Test", "Index"));
        let provider = ValueProviderFactoryCollection::default().get_value_provider(&context);
        let binding = ModelBindingContext {
            model_name: key.clone(),
            model_metadata: ModelMetadata::string("value").build(),
            value_provider: &provider,
            fallback_to_empty_prefix: false,
            validate_request: true,
        };

        let bound = DefaultModelBinder::default().bind_model(&mut context, &binding).unwrap();

        prop_assert_eq!(bound, Some(Value::String(value)));
        prop_assert!(context.model_state.get(&key).is_some());
        prop_assert!(context.model_state.is_valid());
    }

    /// Nothing binds when the posted key only shares a textual prefix.
    #[test]
    fn sibling_keys_do_not_bind(key in model_key()) {
        let request = post("/test/index").with_form(format!("{key}x"), "1");
        let mut context = TestController::context_for(routed(request, "Test", "Index"));
        let provider = ValueProviderFactoryCollection::default().get_value_provider(&context);
        let binding = ModelBindingContext {
            model_name: key,
            model_metadata: ModelMetadata::string("value").build(),
            value_provider: &provider,
            fallback_to_empty_prefix: false,
            validate_request: true,
        };

        let bound = DefaultModelBinder::default().bind_model(&mut context, &binding).unwrap();

        prop_assert_eq!(bound, None);
    }
}
