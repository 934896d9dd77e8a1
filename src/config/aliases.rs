//! Parameter alias handling for the `key=value` configuration surface.

use std::collections::HashMap;

/// Canonical-name lookup for parameter aliases.
pub struct ParameterAlias;

impl ParameterAlias {
    /// Rewrites aliased keys in `params` to their canonical names. When a
    /// canonical key is already present it wins over any alias.
    pub fn key_alias_transform(params: &mut HashMap<String, String>) {
        let table = Self::alias_table();
        let keys: Vec<String> = params.keys().cloned().collect();
        for key in keys {
            if let Some(&canonical) = table.get(key.as_str()) {
                if !params.contains_key(canonical) {
                    let value = params.remove(&key).unwrap();
                    params.insert(canonical.to_string(), value);
                } else {
                    params.remove(&key);
                }
            }
        }
    }

    fn alias_table() -> HashMap<&'static str, &'static str> {
        let mut m = HashMap::new();
        m.insert("config", "config_file");
        m.insert("train", "data");
        m.insert("train_data", "data");
        m.insert("test", "valid_data");
        m.insert("test_data", "valid_data");
        m.insert("valid", "valid_data");
        m.insert("model_output", "output_model");
        m.insert("model_out", "output_model");
        m.insert("model_input", "input_model");
        m.insert("model_in", "input_model");
        m.insert("predict_result", "output_result");
        m.insert("prediction_result", "output_result");
        m.insert("application", "objective");
        m.insert("app", "objective");
        m.insert("boosting_type", "boosting");
        m.insert("boost", "boosting");
        m.insert("num_iteration", "num_iterations");
        m.insert("num_tree", "num_iterations");
        m.insert("num_trees", "num_iterations");
        m.insert("num_round", "num_iterations");
        m.insert("num_rounds", "num_iterations");
        m.insert("shrinkage_rate", "learning_rate");
        m.insert("num_leaf", "num_leaves");
        m.insert("sub_row", "bagging_fraction");
        m.insert("subsample", "bagging_fraction");
        m.insert("subsample_freq", "bagging_freq");
        m.insert("sub_feature", "feature_fraction");
        m.insert("colsample_bytree", "feature_fraction");
        m.insert("min_data_per_leaf", "min_data_in_leaf");
        m.insert("min_data", "min_data_in_leaf");
        m.insert("min_sum_hessian_per_leaf", "min_sum_hessian_in_leaf");
        m.insert("min_sum_hessian", "min_sum_hessian_in_leaf");
        m.insert("min_hessian", "min_sum_hessian_in_leaf");
        m.insert("lambda", "lambda_l2");
        m.insert("min_split_gain", "min_gain_to_split");
        m.insert("early_stopping_rounds", "early_stopping_round");
        m.insert("early_stopping", "early_stopping_round");
        m.insert("num_machine", "num_machines");
        m.insert("local_port", "local_listen_port");
        m.insert("port", "local_listen_port");
        m.insert("mlist", "machine_list_file");
        m.insert("two_round", "use_two_round_loading");
        m.insert("two_round_loading", "use_two_round_loading");
        m.insert("save_binary", "is_save_binary_file");
        m.insert("is_sparse", "is_enable_sparse");
        m.insert("enable_sparse", "is_enable_sparse");
        m.insert("tranining_metric", "is_training_metric");
        m.insert("train_metric", "is_training_metric");
        m.insert("ndcg_at", "eval_at");
        m.insert("eval_metric", "metric");
        m.insert("metrics", "metric");
        m.insert("metric_types", "metric");
        m.insert("num_classes", "num_class");
        m.insert("unbalanced_sets", "is_unbalance");
        m.insert("verbose", "verbosity");
        m.insert("rate_drop", "drop_rate");
        m.insert("header", "has_header");
        m.insert("label", "label_column");
        m.insert("weight", "weight_column");
        m.insert("group", "group_column");
        m.insert("query", "group_column");
        m.insert("query_column", "group_column");
        m.insert("ignore_feature", "ignore_column");
        m.insert("blacklist", "ignore_column");
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_rewrites_to_canonical() {
        let mut params = HashMap::new();
        params.insert("num_tree".to_string(), "50".to_string());
        params.insert("sub_row".to_string(), "0.8".to_string());
        ParameterAlias::key_alias_transform(&mut params);
        assert_eq!(params.get("num_iterations").unwrap(), "50");
        assert_eq!(params.get("bagging_fraction").unwrap(), "0.8");
        assert!(!params.contains_key("num_tree"));
    }

    #[test]
    fn canonical_key_wins_over_alias() {
        let mut params = HashMap::new();
        params.insert("num_iterations".to_string(), "100".to_string());
        params.insert("num_round".to_string(), "5".to_string());
        ParameterAlias::key_alias_transform(&mut params);
        assert_eq!(params.get("num_iterations").unwrap(), "100");
        assert!(!params.contains_key("num_round"));
    }

    #[test]
    fn canonical_keys_are_never_their_own_alias() {
        // a self-mapped row would delete the user's value in the
        // redundant-alias branch of the transform
        for (alias, canonical) in ParameterAlias::alias_table() {
            assert_ne!(alias, canonical, "{} maps to itself", alias);
        }
    }

    #[test]
    fn canonical_keys_pass_through_untouched() {
        let mut params = HashMap::new();
        params.insert("drop_seed".to_string(), "9".to_string());
        params.insert("bagging_seed".to_string(), "7".to_string());
        ParameterAlias::key_alias_transform(&mut params);
        assert_eq!(params.get("drop_seed").unwrap(), "9");
        assert_eq!(params.get("bagging_seed").unwrap(), "7");
    }
}
